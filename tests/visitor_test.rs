//! Integration tests for content traversal.

use rapport::model::{Block, Content, ListType, Section};
use rapport::render::visitor::{outline, section_number, walk, ContentVisitor};
use rapport::ContentStats;

/// Visitor recording the traversal order.
#[derive(Default)]
struct TraceVisitor {
    events: Vec<String>,
}

impl ContentVisitor for TraceVisitor {
    fn enter_section(&mut self, section: &Section, path: &[usize]) {
        self.events
            .push(format!("enter {} {}", section_number(path), section.title));
    }

    fn visit_block(&mut self, _section: &Section, block: &Block) {
        self.events.push(format!("block {}", block.kind()));
    }

    fn leave_section(&mut self, section: &Section) {
        self.events.push(format!("leave {}", section.title));
    }
}

fn sample() -> Content {
    Content::new(vec![
        Section::new("s1", "Contexte", 1)
            .with_block(Block::paragraph("Introduction"))
            .with_child(
                Section::new("s1-1", "Marché", 2)
                    .with_block(Block::list(ListType::Bulleted, ["Nord", "Sud"]))
                    .with_child(Section::new("s1-1-1", "Détail", 3)),
            ),
        Section::new("s2", "Résultats", 1).with_block(Block::Pagebreak),
    ])
}

#[test]
fn test_walk_is_depth_first() {
    let mut visitor = TraceVisitor::default();
    walk(&sample(), &mut visitor);

    assert_eq!(
        visitor.events,
        vec![
            "enter 1 Contexte",
            "block paragraph",
            "enter 1.1 Marché",
            "block list",
            "enter 1.1.1 Détail",
            "leave Détail",
            "leave Marché",
            "leave Contexte",
            "enter 2 Résultats",
            "block pagebreak",
            "leave Résultats",
        ]
    );
}

#[test]
fn test_default_visitor_methods_do_nothing() {
    struct Silent;
    impl ContentVisitor for Silent {}

    walk(&sample(), &mut Silent);
}

#[test]
fn test_walk_empty_content() {
    let mut visitor = TraceVisitor::default();
    walk(&Content::default(), &mut visitor);
    assert!(visitor.events.is_empty());
}

#[test]
fn test_outline_numbering() {
    let entries = outline(&sample(), 2);
    let numbers: Vec<&str> = entries.iter().map(|e| e.number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "1.1", "2"]);
    assert_eq!(entries[1].title, "Marché");
    assert_eq!(entries[1].depth, 2);

    assert_eq!(outline(&sample(), 6).len(), 4);
}

#[test]
fn test_content_stats() {
    let stats = ContentStats::collect(&sample());
    assert_eq!(stats.section_count, 4);
    assert_eq!(stats.max_depth, 3);
    assert_eq!(stats.paragraph_count, 1);
    assert_eq!(stats.list_count, 1);
    assert_eq!(stats.list_item_count, 2);
    assert_eq!(stats.other_count, 1);
}
