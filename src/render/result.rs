//! Renderer output and content statistics.

use super::visitor::{walk, ContentVisitor};
use crate::model::{Block, Content, Section};
use serde::{Deserialize, Serialize};

/// Output of one renderer: the encoded bytes and the number of layout units
/// produced (pages, slides or sheets; 1 for flowed text formats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Encoded document
    pub bytes: Vec<u8>,

    /// Pages, slides or sheets emitted
    pub units: usize,
}

impl Rendered {
    /// Create a new render output.
    pub fn new(bytes: Vec<u8>, units: usize) -> Self {
        Self { bytes, units }
    }

    /// Wrap a text document (one flowing unit).
    pub fn text(content: String) -> Self {
        Self {
            bytes: content.into_bytes(),
            units: 1,
        }
    }

    /// Get the payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Statistics about a content tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStats {
    /// Sections at every depth
    pub section_count: u32,

    /// Deepest section level
    pub max_depth: u8,

    /// Paragraph blocks
    pub paragraph_count: u32,

    /// Heading blocks
    pub heading_count: u32,

    /// List blocks
    pub list_count: u32,

    /// List items across all lists
    pub list_item_count: u32,

    /// Table blocks
    pub table_count: u32,

    /// Data rows across all tables
    pub table_row_count: u32,

    /// KPI cards
    pub kpi_count: u32,

    /// Chart blocks
    pub chart_count: u32,

    /// Image blocks
    pub image_count: u32,

    /// Callouts, quotes, dividers and page breaks
    pub other_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,
}

impl ContentStats {
    /// Collect statistics over a content tree.
    pub fn collect(content: &Content) -> Self {
        let mut stats = Self::default();
        walk(content, &mut stats);
        stats
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> u32 {
        self.paragraph_count
            + self.heading_count
            + self.table_count
            + self.kpi_count
            + self.chart_count
            + self.image_count
            + self.other_count
            + self.list_count
    }

    fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
    }
}

impl ContentVisitor for ContentStats {
    fn enter_section(&mut self, section: &Section, _path: &[usize]) {
        self.section_count += 1;
        self.max_depth = self.max_depth.max(section.level);
        self.count_text(&section.title);
    }

    fn visit_block(&mut self, _section: &Section, block: &Block) {
        match block {
            Block::Paragraph { content } => {
                self.paragraph_count += 1;
                self.count_text(content);
            }
            Block::Heading { content, .. } => {
                self.heading_count += 1;
                self.count_text(content);
            }
            Block::List { items, .. } => {
                self.list_count += 1;
                self.list_item_count += items.len() as u32;
                for item in items {
                    self.count_text(&item.content);
                }
            }
            Block::Table(table) => {
                self.table_count += 1;
                self.table_row_count += table.rows.len() as u32;
            }
            Block::KpiCard(_) => self.kpi_count += 1,
            Block::Chart(_) => self.chart_count += 1,
            Block::Image { .. } => self.image_count += 1,
            Block::Callout { content, .. } | Block::Quote { content, .. } => {
                self.other_count += 1;
                self.count_text(content);
            }
            Block::Divider { .. } | Block::Pagebreak => self.other_count += 1,
        }
    }
}
