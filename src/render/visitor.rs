//! Depth-first traversal of the section tree.
//!
//! Renderers that only need to collect blocks (the workbook, statistics)
//! implement [`ContentVisitor`] instead of writing their own recursion.
//!
//! # Example
//!
//! ```
//! use rapport::model::{Block, Content, Section};
//! use rapport::render::visitor::{walk, ContentVisitor};
//!
//! #[derive(Default)]
//! struct TableCounter(usize);
//!
//! impl ContentVisitor for TableCounter {
//!     fn visit_block(&mut self, _section: &Section, block: &Block) {
//!         if matches!(block, Block::Table(_)) {
//!             self.0 += 1;
//!         }
//!     }
//! }
//!
//! let mut counter = TableCounter::default();
//! walk(&Content::default(), &mut counter);
//! assert_eq!(counter.0, 0);
//! ```

use crate::model::{Block, Content, Section};

/// Callbacks invoked during a depth-first walk.
///
/// Every method defaults to doing nothing.
pub trait ContentVisitor {
    /// Called before a section's blocks.
    ///
    /// `path` holds the 1-based index of the section at each depth, so the
    /// second child of the first top-level section has path `[1, 2]`.
    fn enter_section(&mut self, section: &Section, path: &[usize]) {
        let _ = (section, path);
    }

    /// Called for every block, in document order.
    fn visit_block(&mut self, section: &Section, block: &Block) {
        let _ = (section, block);
    }

    /// Called after a section's blocks and children.
    fn leave_section(&mut self, section: &Section) {
        let _ = section;
    }
}

/// Walk the content tree depth first: a section's blocks come before its
/// children.
pub fn walk<V: ContentVisitor + ?Sized>(content: &Content, visitor: &mut V) {
    let mut path = Vec::new();
    for (i, section) in content.sections.iter().enumerate() {
        path.push(i + 1);
        walk_section(section, &mut path, visitor);
        path.pop();
    }
}

fn walk_section<V: ContentVisitor + ?Sized>(
    section: &Section,
    path: &mut Vec<usize>,
    visitor: &mut V,
) {
    visitor.enter_section(section, path);
    for block in &section.blocks {
        visitor.visit_block(section, block);
    }
    for (i, child) in section.children.iter().enumerate() {
        path.push(i + 1);
        walk_section(child, path, visitor);
        path.pop();
    }
    visitor.leave_section(section);
}

/// Format a section path as hierarchical numbering ("1.2.3").
pub fn section_number(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// One entry of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// Dotted section number ("2.1")
    pub number: String,
    /// Section title
    pub title: String,
    /// Nesting depth in the tree (1 = top level)
    pub depth: usize,
}

/// Sections down to `max_depth`, numbered by position, in document order.
pub fn outline(content: &Content, max_depth: usize) -> Vec<OutlineEntry> {
    struct Collector {
        max_depth: usize,
        entries: Vec<OutlineEntry>,
    }

    impl ContentVisitor for Collector {
        fn enter_section(&mut self, section: &Section, path: &[usize]) {
            if path.len() <= self.max_depth {
                self.entries.push(OutlineEntry {
                    number: section_number(path),
                    title: section.title.clone(),
                    depth: path.len(),
                });
            }
        }
    }

    let mut collector = Collector {
        max_depth,
        entries: Vec::new(),
    };
    walk(content, &mut collector);
    collector.entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ContentVisitor for Recorder {
        fn enter_section(&mut self, section: &Section, path: &[usize]) {
            self.events
                .push(format!("enter {} {}", section.id, section_number(path)));
        }

        fn visit_block(&mut self, section: &Section, block: &Block) {
            self.events.push(format!("block {} {}", section.id, block.kind()));
        }

        fn leave_section(&mut self, section: &Section) {
            self.events.push(format!("leave {}", section.id));
        }
    }

    #[test]
    fn test_walk_order() {
        let content = Content::new(vec![
            Section::new("a", "A", 1)
                .with_block(Block::paragraph("x"))
                .with_child(Section::new("a1", "A1", 2).with_block(Block::Pagebreak))
                .with_child(Section::new("a2", "A2", 2)),
            Section::new("b", "B", 1),
        ]);

        let mut recorder = Recorder::default();
        walk(&content, &mut recorder);

        assert_eq!(
            recorder.events,
            vec![
                "enter a 1",
                "block a paragraph",
                "enter a1 1.1",
                "block a1 pagebreak",
                "leave a1",
                "enter a2 1.2",
                "leave a2",
                "leave a",
                "enter b 2",
                "leave b",
            ]
        );
    }

    #[test]
    fn test_outline_depth() {
        let content = Content::new(vec![
            Section::new("a", "Ventes", 1).with_child(
                Section::new("a1", "Nord", 2).with_child(Section::new("a11", "Lille", 3)),
            ),
            Section::new("b", "Charges", 1),
        ]);
        let entries = outline(&content, 2);
        let numbers: Vec<_> = entries.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "1.1", "2"]);
        assert_eq!(entries[1].depth, 2);
        assert_eq!(entries[2].title, "Charges");
    }
}
