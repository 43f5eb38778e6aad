//! Integration tests for the format dispatcher.

use std::io::{Cursor, Read};

use chrono::{TimeZone, Utc};
use rapport::model::{Block, CellValue, Content, KpiCard, Report, Section, Table, TableHeader};
use rapport::{export, export_document, Document, ExportFormat, ExportOptions, Exporter};

fn options() -> ExportOptions {
    ExportOptions::new().with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 8, 0, 0).unwrap())
}

fn report(title: &str) -> Report {
    Report::new("r1", title, Utc.with_ymd_and_hms(2024, 4, 2, 9, 30, 0).unwrap())
        .with_author("Direction commerciale")
        .with_period("T1 2024")
}

fn sales_content() -> Content {
    let mut table = Table::new(vec![
        TableHeader::new("Région", "region"),
        TableHeader::new("Ventes", "sales"),
    ]);
    table.push_row::<CellValue>(["Nord".into(), 120.into()]);
    table.push_row::<CellValue>(["Sud".into(), 80.5.into()]);

    Content::new(vec![
        Section::new("s1", "Ventes", 1).with_block(Block::Table(table)),
        Section::new("s2", "Indicateurs", 1)
            .with_block(Block::KpiCard(KpiCard::new("Marge", 12).with_unit("%").with_change(2.5)))
            .with_block(Block::KpiCard(KpiCard::new("Churn", 3).with_unit("%").with_change(-0.8))),
    ])
}

fn zip_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn test_sales_report_to_pdf() {
    let result = export(&report("Q1 Report: Sales/Ops"), &sales_content(), "pdf", &options());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.filename.as_deref(), Some("Q1_Report_SalesOps.pdf"));
    assert_eq!(result.mime_type, Some("application/pdf"));
    assert!(result.error.is_none());
    assert!(result.bytes.as_ref().unwrap().starts_with(b"%PDF-"));
    assert!(result.unit_count >= 1);
}

#[test]
fn test_sales_report_to_xlsx() {
    let result = export(&report("Q1 Report: Sales/Ops"), &sales_content(), "xlsx", &options());
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.filename.as_deref(), Some("Q1_Report_SalesOps.xlsx"));

    let bytes = result.bytes.unwrap();
    let workbook = zip_entry(&bytes, "xl/workbook.xml");
    let first = workbook.find("name=\"Résumé\"").unwrap();
    let second = workbook.find("name=\"Tableau 1\"").unwrap();
    let third = workbook.find("name=\"Indicateurs\"").unwrap();
    assert!(first < second && second < third);
    assert_eq!(result.unit_count, 3);

    let sheet = zip_entry(&bytes, "xl/worksheets/sheet2.xml");
    assert_eq!(sheet.matches("<row ").count(), 3);
    assert!(sheet.contains("Région"));
    assert!(sheet.contains("<v>80.5</v>"));
    assert!(!sheet.contains("r=\"C1\""));
}

#[test]
fn test_unsupported_format() {
    let result = export(&report("Bilan"), &sales_content(), "xml", &options());

    assert!(!result.success);
    assert!(result.bytes.is_none());
    assert!(result.filename.is_none());
    assert_eq!(result.error.as_deref(), Some("Format non supporté: xml"));
    assert_eq!(result.mime_type, None);
}

#[test]
fn test_format_names_are_case_insensitive() {
    let result = export(&report("Bilan"), &sales_content(), " Markdown ", &options());
    assert!(result.success);
    assert_eq!(result.filename.as_deref(), Some("Bilan.md"));
}

#[test]
fn test_kpi_sign_survives_text_formats() {
    let content = sales_content();

    let markdown = export(&report("Bilan"), &content, "markdown", &options());
    let markdown = String::from_utf8(markdown.bytes.unwrap()).unwrap();
    assert!(markdown.contains("+2.5%"));
    assert!(markdown.contains("-0.8%"));

    let html = export(&report("Bilan"), &content, "html", &options());
    let html = String::from_utf8(html.bytes.unwrap()).unwrap();
    assert!(html.contains("<span class=\"kpi-change\">+2.5%</span>"));
    assert!(html.contains("<span class=\"kpi-change\">-0.8%</span>"));
    assert!(html.contains("kpi-positive"));
    assert!(html.contains("kpi-negative"));
}

#[test]
fn test_fixed_timestamp_is_reproducible() {
    for format in ExportFormat::ALL {
        let a = export(&report("Bilan"), &sales_content(), format.as_str(), &options());
        let b = export(&report("Bilan"), &sales_content(), format.as_str(), &options());
        assert!(a.success, "{}: {:?}", format, a.error);
        assert_eq!(a.bytes, b.bytes, "{} output differs between runs", format);
    }
}

#[test]
fn test_empty_content_exports_everywhere() {
    let exporter = Exporter::with_options(options());
    let document = Document::new(report("Vide"), Content::default());

    for (format, result) in exporter.export_all(&document) {
        assert!(result.success, "{}: {:?}", format, result.error);
        assert!(!result.is_empty());
        assert!(result.unit_count >= 1);
    }
}

#[test]
fn test_malformed_table_fails_cleanly() {
    let content = Content::new(vec![
        Section::new("s1", "Données", 1).with_block(Block::Table(Table::default()))
    ]);

    let result = export(&report("Bilan"), &content, "xlsx", &options());
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Données"));
    assert_eq!(
        result.mime_type,
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
    );
}

#[test]
fn test_document_json_round_trip_export() {
    let json = r##"{
        "report": {
            "id": "r9", "title": "Revue mensuelle", "status": "published",
            "createdAt": "2024-03-01T00:00:00Z", "updatedAt": "2024-03-31T00:00:00Z"
        },
        "content": { "sections": [
            { "id": "a", "title": "Faits marquants", "level": 1, "blocks": [
                { "type": "callout", "variant": "warning", "content": "Stock bas" },
                { "type": "quote", "content": "Bon trimestre", "author": "DG" }
            ] }
        ] },
        "design": { "primaryColor": "#0F766E", "footerText": "Usage interne" }
    }"##;
    let document = Document::from_json(json).unwrap();

    let html = export_document(&document, "html", &options());
    let html = String::from_utf8(html.bytes.unwrap()).unwrap();
    assert!(html.contains("#0F766E") || html.contains("#0f766e"));
    assert!(html.contains("Usage interne"));
    assert!(html.contains("callout-warning"));
}
