//! Rendering module for converting reports to the supported output formats.
//!
//! Each renderer is a small struct holding its [`ExportOptions`] and
//! implementing [`DocumentRenderer`]. Renderers only read the model; the
//! dispatcher in [`crate::export`] picks one per format.

pub mod chart;
mod docx;
mod html;
mod markdown;
mod options;
mod package;
mod pdf;
mod pptx;
mod result;
pub mod visitor;
mod xlsx;

pub use chart::{
    embed_chart, embed_image, ChartEmbed, ChartPart, Embed, EmbeddingFailure, ImageEmbed, ImagePart,
};
pub use docx::{to_docx, DocxRenderer};
pub use html::{to_html, HtmlRenderer};
pub use markdown::{to_markdown, MarkdownRenderer};
pub use options::{ExportOptions, SlideLayout};
pub use pdf::{to_pdf, PdfLayout, PdfRenderer, Placement};
pub use pptx::{to_pptx, PptxRenderer, SlidePlan};
pub use result::{ContentStats, Rendered};
pub use visitor::{outline, section_number, walk, ContentVisitor, OutlineEntry};
pub use xlsx::{to_xlsx, XlsxRenderer};

use crate::error::Result;
use crate::model::{Content, Report};

/// Trait for output renderers.
///
/// Implement this trait to add a new output format.
pub trait DocumentRenderer: Send + Sync {
    /// Get the name of this renderer.
    fn name(&self) -> &'static str;

    /// Render the report into an encoded document.
    fn render(&self, report: &Report, content: &Content) -> Result<Rendered>;
}
