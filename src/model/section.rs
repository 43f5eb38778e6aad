//! Section tree types.

use super::{Block, ChangeType, MAX_HEADING_LEVEL};
use serde::{Deserialize, Serialize};

/// Editing status of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Not started or in progress
    #[default]
    Draft,
    /// Written, awaiting review
    InReview,
    /// Validated
    Validated,
}

/// The section tree of a report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    /// Top-level sections, in order
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Content {
    /// Create content from top-level sections.
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Check if there are no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of sections, nested ones included.
    pub fn section_count(&self) -> usize {
        fn count(sections: &[Section]) -> usize {
            sections.iter().map(|s| 1 + count(&s.children)).sum()
        }
        count(&self.sections)
    }

    /// Check every model invariant and report the violations found.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for section in &self.sections {
            if section.level < 1 {
                violations.push(Violation::new(&section.id, "niveau de section inférieur à 1"));
            }
            section.validate_into(&mut violations);
        }
        violations
    }
}

/// A recursive container of blocks and child sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier
    pub id: String,

    /// Section title
    pub title: String,

    /// Nesting level (1 = top level)
    pub level: u8,

    /// Content blocks
    #[serde(default)]
    pub blocks: Vec<Block>,

    /// Nested sections
    #[serde(default)]
    pub children: Vec<Section>,

    /// Editing status
    #[serde(default)]
    pub status: SectionStatus,

    /// Locked against editing
    #[serde(default)]
    pub locked: bool,

    /// Collapsed in the editor
    #[serde(default)]
    pub collapsed: bool,
}

impl Section {
    /// Create an empty section.
    pub fn new(id: impl Into<String>, title: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            level,
            blocks: Vec::new(),
            children: Vec::new(),
            status: SectionStatus::Draft,
            locked: false,
            collapsed: false,
        }
    }

    /// Append a block and return self.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append a child section and return self.
    pub fn with_child(mut self, child: Section) -> Self {
        self.children.push(child);
        self
    }

    /// Level clamped to the markup depth limit.
    pub fn depth(&self) -> u8 {
        self.level.clamp(1, MAX_HEADING_LEVEL)
    }

    fn validate_into(&self, out: &mut Vec<Violation>) {
        for block in &self.blocks {
            match block {
                Block::Heading { level, .. } if *level < 1 || *level > MAX_HEADING_LEVEL => {
                    out.push(Violation::new(
                        &self.id,
                        format!("niveau de titre hors limites: {}", level),
                    ));
                }
                Block::Table(table) => {
                    for (i, row) in table.rows.iter().enumerate() {
                        for key in row.keys() {
                            if !table.headers.iter().any(|h| &h.key == key) {
                                out.push(Violation::new(
                                    &self.id,
                                    format!("ligne {}: clé inconnue '{}'", i + 1, key),
                                ));
                            }
                        }
                    }
                }
                Block::KpiCard(kpi) => {
                    if let Some(change) = kpi.change {
                        let expected = if change >= 0.0 {
                            ChangeType::Positive
                        } else {
                            ChangeType::Negative
                        };
                        if kpi.change_type != expected {
                            out.push(Violation::new(
                                &self.id,
                                format!(
                                    "indicateur '{}': type {} incohérent avec la variation {}",
                                    kpi.label,
                                    kpi.change_type.as_str(),
                                    change
                                ),
                            ));
                        }
                    }
                }
                Block::Chart(chart) => {
                    let labels = chart.data.labels.len();
                    for dataset in &chart.data.datasets {
                        if dataset.data.len() != labels {
                            out.push(Violation::new(
                                &self.id,
                                format!(
                                    "série '{}': {} valeurs pour {} libellés",
                                    dataset.label,
                                    dataset.data.len(),
                                    labels
                                ),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        for child in &self.children {
            if child.level != self.level.saturating_add(1) {
                out.push(Violation::new(
                    &child.id,
                    format!(
                        "niveau {} sous une section de niveau {}",
                        child.level, self.level
                    ),
                ));
            }
            child.validate_into(out);
        }
    }
}

/// A model invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Section holding the offending element
    pub section_id: String,
    /// Description of the problem
    pub message: String,
}

impl Violation {
    fn new(section_id: &str, message: impl Into<String>) -> Self {
        Self {
            section_id: section_id.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.section_id, self.message)
    }
}
