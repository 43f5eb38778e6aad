//! Document model shared by every renderer.
//!
//! A report is exported from two values: the [`Report`] metadata record and
//! the [`Content`] tree of sections and typed blocks. Both are built by the
//! authoring side and consumed read-only here; no renderer mutates them.

mod block;
mod design;
mod report;
mod section;

pub use block::{
    Alignment, Block, CalloutVariant, CellValue, ChangeType, Chart, ChartConfig, ChartData,
    ChartKind, Dataset, DividerStyle, KpiCard, ListItem, ListType, Table, TableCell, TableHeader,
    TableRow,
};
pub use design::{DesignSettings, Rgb, Theme};
pub use report::{Document, Report, ReportStatus};
pub use section::{Content, Section, SectionStatus, Violation};

/// Deepest heading level any markup renderer emits.
pub const MAX_HEADING_LEVEL: u8 = 6;
