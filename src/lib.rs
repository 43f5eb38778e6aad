//! # rapport
//!
//! Multi-format business report export for Rust.
//!
//! A report is described once, as a [`Report`] metadata record plus a
//! [`Content`] tree of sections and typed blocks, and rendered to PDF, DOCX,
//! XLSX, HTML, Markdown or PPTX.
//!
//! ## Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use rapport::model::{Block, Content, KpiCard, Report, Section};
//! use rapport::{export, ExportOptions};
//!
//! let report = Report::new("r1", "Bilan T1", Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap())
//!     .with_period("T1 2024");
//! let content = Content::new(vec![Section::new("s1", "Synthèse", 1)
//!     .with_block(Block::paragraph("Le chiffre d'affaires progresse."))
//!     .with_block(Block::KpiCard(KpiCard::new("CA", 1250).with_unit("k€").with_change(4.5)))]);
//!
//! let result = export(&report, &content, "pdf", &ExportOptions::default());
//! assert!(result.success);
//! assert_eq!(result.filename.as_deref(), Some("Bilan_T1.pdf"));
//! ```
//!
//! ## Features
//!
//! - **Six output formats**: PDF, DOCX, XLSX, HTML, Markdown, PPTX
//! - **Layout per format**: page pagination, slide overflow, sheet partitioning
//! - **Semantic fidelity**: heading nesting, table structure, KPI sign, callout variants
//! - **Native charts**: bar, line, area, pie and doughnut charts in slide decks
//! - **Branding**: colours, cover texts and footer from [`DesignSettings`]
//! - **Reproducible output**: fixed timestamps via [`ExportOptions::with_generated_at`]

pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod render;
pub mod text;

// Re-export commonly used types
pub use error::{Error, Result};
pub use export::{export, export_as, export_document, ExportFormat, ExportResult, Exporter};
pub use layout::{MarginProfile, Orientation, PageSize};
pub use model::{
    Block, Content, DesignSettings, Document, KpiCard, Report, ReportStatus, Section, Table,
    TableHeader, Theme,
};
pub use render::{
    ContentStats, DocumentRenderer, ExportOptions, Rendered, SlideLayout,
};

use std::path::Path;

/// Load a bundled document (`{report, content, design?}`) from a JSON file.
///
/// # Example
///
/// ```no_run
/// use rapport::load_document;
///
/// let doc = load_document("rapport.json").unwrap();
/// println!("Sections: {}", doc.content.section_count());
/// ```
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    let json = std::fs::read_to_string(path)?;
    Document::from_json(&json)
}

/// Export a JSON document file in the named format.
///
/// # Example
///
/// ```no_run
/// use rapport::{export_file, ExportOptions};
///
/// let result = export_file("rapport.json", "docx", &ExportOptions::default()).unwrap();
/// std::fs::write(result.filename.unwrap(), result.bytes.unwrap()).unwrap();
/// ```
pub fn export_file<P: AsRef<Path>>(
    path: P,
    format: &str,
    options: &ExportOptions,
) -> Result<ExportResult> {
    let document = load_document(path)?;
    Ok(export_document(&document, format, options))
}

/// Collect block and section statistics for a document.
pub fn stats(content: &Content) -> ContentStats {
    ContentStats::collect(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    const DOCUMENT: &str = r#"{
        "report": {
            "id": "r1", "title": "Bilan T1", "createdAt": "2024-04-02T09:30:00Z",
            "updatedAt": "2024-04-02T09:30:00Z"
        },
        "content": { "sections": [ { "id": "s1", "title": "Synthèse", "level": 1,
            "blocks": [ { "type": "paragraph", "content": "Bonjour" } ] } ] },
        "design": { "footerText": "Confidentiel" }
    }"#;

    #[test]
    fn test_exporter_builder() {
        let exporter = Exporter::new()
            .with_page_size(PageSize::A3)
            .with_margins(MarginProfile::Wide)
            .without_table_of_contents();

        assert_eq!(exporter.options().page_size, PageSize::A3);
        assert_eq!(exporter.options().margins, MarginProfile::Wide);
        assert!(!exporter.options().include_table_of_contents);
        assert!(exporter.options().include_cover_page);
    }

    #[test]
    fn test_export_file_applies_design() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();

        let options = ExportOptions::new()
            .with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap());
        let result = export_file(file.path(), "markdown", &options).unwrap();
        assert!(result.success);
        let text = String::from_utf8(result.bytes.unwrap()).unwrap();
        assert!(text.contains("Confidentiel"));
        assert!(text.contains("## Synthèse"));
    }

    #[test]
    fn test_load_document_missing_file() {
        let err = load_document("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_document_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(load_document(file.path()), Err(Error::Json(_))));
    }

    #[test]
    fn test_stats() {
        let document = Document::from_json(DOCUMENT).unwrap();
        let stats = stats(&document.content);
        assert_eq!(stats.section_count, 1);
        assert_eq!(stats.paragraph_count, 1);
    }
}
