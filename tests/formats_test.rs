//! Structural checks on the binary formats.

use std::io::{Cursor, Read};

use chrono::{TimeZone, Utc};
use rapport::layout::{Orientation, PageSize};
use rapport::model::{
    Block, CalloutVariant, Chart, ChartData, Content, Dataset, KpiCard, ListType, Report, Section,
    Table, TableHeader,
};
use rapport::{export, ExportOptions};

fn options() -> ExportOptions {
    ExportOptions::new().with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 8, 0, 0).unwrap())
}

fn report() -> Report {
    Report::new("r1", "Bilan T1", Utc.with_ymd_and_hms(2024, 4, 2, 9, 30, 0).unwrap())
        .with_description("Synthèse trimestrielle")
        .with_period("T1 2024")
}

fn rich_content() -> Content {
    let mut table = Table::new(vec![
        TableHeader::new("Mois", "month"),
        TableHeader::new("CA", "revenue"),
    ]);
    for (month, revenue) in [("Janvier", 410), ("Février", 395), ("Mars", 445)] {
        table.push_row::<rapport::model::CellValue>([month.into(), revenue.into()]);
    }

    let chart = Chart::new(
        "bar",
        ChartData {
            labels: vec!["Jan".into(), "Fév".into(), "Mar".into()],
            datasets: vec![Dataset::new("CA", vec![410.0, 395.0, 445.0])],
        },
    )
    .with_title("Chiffre d'affaires");

    Content::new(vec![
        Section::new("s1", "Synthèse", 1)
            .with_block(Block::paragraph("Trimestre en croissance."))
            .with_block(Block::KpiCard(KpiCard::new("CA", 1250).with_unit("k€").with_change(4.2)))
            .with_block(Block::callout(CalloutVariant::Info, "Chiffres provisoires"))
            .with_child(
                Section::new("s1-1", "Détail", 2)
                    .with_block(Block::Table(table))
                    .with_block(Block::list(ListType::Numbered, ["Nord", "Sud"])),
            ),
        Section::new("s2", "Graphiques", 1)
            .with_block(Block::Chart(chart))
            .with_block(Block::Pagebreak)
            .with_block(Block::quote("Objectifs tenus", Some("DG"))),
    ])
}

fn archive(bytes: &[u8]) -> zip::ZipArchive<Cursor<&[u8]>> {
    zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> String {
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing part {}", name))
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// Every part named by an `<Override>` must exist in the archive.
fn assert_overrides_exist(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) {
    let types = read_entry(archive, "[Content_Types].xml");
    let parts: Vec<String> = types
        .split("PartName=\"/")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(str::to_string)
        .collect();
    assert!(!parts.is_empty());
    for part in parts {
        assert!(archive.by_name(&part).is_ok(), "override without part: {}", part);
    }
}

fn export_bytes(format: &str, options: &ExportOptions) -> (Vec<u8>, usize) {
    let result = export(&report(), &rich_content(), format, options);
    assert!(result.success, "{}: {:?}", format, result.error);
    let units = result.unit_count;
    (result.bytes.unwrap(), units)
}

#[test]
fn test_pdf_structure() {
    let (bytes, units) = export_bytes("pdf", &options());
    let doc = lopdf::Document::load_mem(&bytes).unwrap();

    assert_eq!(doc.get_pages().len(), units);
    // cover, contents, then at least two content pages around the page break
    assert!(units >= 4);

    let info = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info).unwrap();
    assert_eq!(info.get(b"Producer").unwrap().as_str().unwrap(), b"rapport");
}

#[test]
fn test_pdf_page_size_follows_options() {
    let options = options()
        .with_page_size(PageSize::Letter)
        .with_orientation(Orientation::Landscape)
        .with_cover_page(false)
        .with_table_of_contents(false);
    let (bytes, _) = export_bytes("pdf", &options);
    let doc = lopdf::Document::load_mem(&bytes).unwrap();

    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let media_box = match page.get(b"MediaBox") {
        Ok(object) => object.as_array().unwrap().clone(),
        Err(_) => {
            let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
            let pages = doc.get_dictionary(parent).unwrap();
            pages.get(b"MediaBox").unwrap().as_array().unwrap().clone()
        }
    };
    let width = media_box[2].as_float().unwrap();
    let height = media_box[3].as_float().unwrap();
    assert!(width > height);
    assert!((width - 792.0).abs() < 1.0);
}

#[test]
fn test_docx_structure() {
    let (bytes, units) = export_bytes("docx", &options());
    let mut zip = archive(&bytes);
    assert_overrides_exist(&mut zip);

    let document = read_entry(&mut zip, "word/document.xml");
    assert!(document.contains("Synthèse"));
    assert!(document.contains("<w:tblHeader/>"));
    assert!(
        document.contains("Chiffre d&apos;affaires") || document.contains("Chiffre d'affaires")
    );
    // cover, contents, first content page, forced break
    assert_eq!(units, 4);

    let rels = read_entry(&mut zip, "word/_rels/document.xml.rels");
    assert!(rels.contains("styles.xml"));
    assert!(rels.contains("footer1.xml"));

    let core = read_entry(&mut zip, "docProps/core.xml");
    assert!(core.contains("Bilan T1"));
}

#[test]
fn test_xlsx_structure() {
    let (bytes, units) = export_bytes("xlsx", &options());
    let mut zip = archive(&bytes);
    assert_overrides_exist(&mut zip);

    let workbook = read_entry(&mut zip, "xl/workbook.xml");
    for name in ["Résumé", "Tableau 1", "Graphique 1", "Indicateurs"] {
        assert!(workbook.contains(&format!("name=\"{}\"", name)), "{}", name);
    }
    assert_eq!(units, 4);

    let chart_sheet = read_entry(&mut zip, "xl/worksheets/sheet3.xml");
    assert_eq!(chart_sheet.matches("<row ").count(), 4);
    assert!(chart_sheet.contains("<v>445</v>"));
}

#[test]
fn test_pptx_structure() {
    let (bytes, units) = export_bytes("pptx", &options());
    let mut zip = archive(&bytes);
    assert_overrides_exist(&mut zip);

    let slides = zip
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .count();
    assert_eq!(slides, units);

    let presentation = read_entry(&mut zip, "ppt/presentation.xml");
    assert_eq!(presentation.matches("<p:sldId ").count(), units);
    assert!(presentation.contains("cx=\"9144000\" cy=\"5143500\""));

    let chart = read_entry(&mut zip, "ppt/charts/chart1.xml");
    assert!(chart.contains("<c:barChart>"));
}

#[test]
fn test_ooxml_archives_share_theme_colours() {
    let options = options().with_design(
        rapport::model::DesignSettings::new().with_primary_color("#B91C1C"),
    );
    for (format, theme_part) in [
        ("docx", "word/theme/theme1.xml"),
        ("xlsx", "xl/theme/theme1.xml"),
        ("pptx", "ppt/theme/theme1.xml"),
    ] {
        let (bytes, _) = export_bytes(format, &options);
        let mut zip = archive(&bytes);
        let theme = read_entry(&mut zip, theme_part);
        assert!(theme.contains("B91C1C"), "{}", format);
    }
}
