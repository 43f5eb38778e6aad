//! Excel (XLSX) rendering.
//!
//! The workbook holds data, not layout: a "Résumé" sheet with the report
//! metadata, one sheet per table, one pivoted sheet per chart and an
//! "Indicateurs" sheet gathering every KPI card.

use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::model::{Block, CellValue, Chart, Content, KpiCard, Report, Section, Table};
use crate::text::escape_xml;

use super::package::{theme_xml, Package, Relationships, REL_STYLES, REL_THEME, XML_DECLARATION};
use super::visitor::{walk, ContentVisitor};
use super::{DocumentRenderer, ExportOptions, Rendered};

const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Longest sheet name Excel accepts.
const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
const MIN_COLUMN_WIDTH: usize = 8;
const MAX_COLUMN_WIDTH: usize = 60;

/// Cell style index of header cells in `styles.xml`.
const HEADER_STYLE: u32 = 1;

/// Convert a report to XLSX bytes.
pub fn to_xlsx(report: &Report, content: &Content, options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(XlsxRenderer::new(options.clone()).render(report, content)?.bytes)
}

/// Excel workbook renderer.
#[derive(Debug, Clone, Default)]
pub struct XlsxRenderer {
    options: ExportOptions,
}

impl XlsxRenderer {
    /// Create a new XLSX renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Names of the sheets the workbook would contain, in order.
    pub fn sheet_names(&self, report: &Report, content: &Content) -> Result<Vec<String>> {
        Ok(collect_sheets(report, content)?
            .into_iter()
            .map(|sheet| sheet.name)
            .collect())
    }
}

impl DocumentRenderer for XlsxRenderer {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        let sheets = collect_sheets(report, content)?;
        let theme = self.options.theme();

        let mut package = Package::new();
        package.add_package_metadata(
            "xl/workbook.xml",
            report,
            &self.options.generated_at(),
            "rapport",
        )?;

        let mut rels = Relationships::new();
        let mut workbook = String::from(XML_DECLARATION);
        let _ = write!(
            workbook,
            r#"<workbook xmlns="{}" xmlns:r="{}"><sheets>"#,
            NS_MAIN, NS_REL
        );
        for (i, sheet) in sheets.iter().enumerate() {
            let path = format!("worksheets/sheet{}.xml", i + 1);
            let id = rels.add(REL_WORKSHEET, &path);
            let _ = write!(
                workbook,
                r#"<sheet name="{}" sheetId="{}" r:id="{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                id
            );
            package.add_part(&format!("xl/{}", path), CT_WORKSHEET, sheet.to_xml())?;
        }
        workbook.push_str("</sheets></workbook>");
        rels.add(REL_STYLES, "styles.xml");
        rels.add(REL_THEME, "theme/theme1.xml");

        package.add_part("xl/workbook.xml", CT_WORKBOOK, workbook)?;
        package.add_part("xl/styles.xml", CT_STYLES, styles_xml(&theme.primary.to_hex()))?;
        package.add_part(
            "xl/theme/theme1.xml",
            super::package::CT_THEME,
            theme_xml(
                &theme.primary.to_hex(),
                &theme.secondary.to_hex(),
                &theme.accent.to_hex(),
            ),
        )?;
        package.add_raw("xl/_rels/workbook.xml.rels", rels.to_xml())?;

        log::debug!("XLSX: {} sheets", sheets.len());
        Ok(Rendered::new(package.finish()?, sheets.len()))
    }
}

/// A worksheet cell.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    fn display_len(&self) -> usize {
        match self {
            Cell::Empty => 0,
            Cell::Number(n) => CellValue::Number(*n).to_string().chars().count(),
            Cell::Bool(_) => 3,
            Cell::Text(s) => s.lines().map(|l| l.chars().count()).max().unwrap_or(0),
        }
    }
}

impl From<&CellValue> for Cell {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Null => Cell::Empty,
            CellValue::Bool(b) => Cell::Bool(*b),
            CellValue::Number(n) if n.is_finite() => Cell::Number(*n),
            CellValue::Number(_) => Cell::Empty,
            CellValue::Text(s) => Cell::Text(s.clone()),
        }
    }
}

/// A sheet: its first row is the header row.
#[derive(Debug, Clone)]
struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: String, headers: impl IntoIterator<Item = String>) -> Self {
        Self {
            name,
            rows: vec![headers.into_iter().map(Cell::Text).collect()],
        }
    }

    fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..columns)
            .map(|c| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(c))
                    .map(Cell::display_len)
                    .max()
                    .unwrap_or(0);
                (longest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
            })
            .collect()
    }

    fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rows.len() * 64);
        xml.push_str(XML_DECLARATION);
        let _ = write!(xml, r#"<worksheet xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL);
        xml.push_str(concat!(
            r#"<sheetViews><sheetView workbookViewId="0">"#,
            r#"<pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/>"#,
            r#"</sheetView></sheetViews>"#
        ));

        let widths = self.column_widths();
        if !widths.is_empty() {
            xml.push_str("<cols>");
            for (i, width) in widths.iter().enumerate() {
                let _ = write!(
                    xml,
                    r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                    n = i + 1,
                    w = width
                );
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (r, row) in self.rows.iter().enumerate() {
            let _ = write!(xml, r#"<row r="{}">"#, r + 1);
            let style = if r == 0 {
                format!(r#" s="{}""#, HEADER_STYLE)
            } else {
                String::new()
            };
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", column_name(c), r + 1);
                match cell {
                    Cell::Empty => {}
                    Cell::Number(n) => {
                        let _ = write!(xml, r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, n);
                    }
                    Cell::Bool(b) => {
                        let _ = write!(
                            xml,
                            r#"<c r="{}"{} t="b"><v>{}</v></c>"#,
                            reference,
                            style,
                            u8::from(*b)
                        );
                    }
                    Cell::Text(s) => {
                        let _ = write!(
                            xml,
                            r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                            reference,
                            style,
                            escape_xml(s)
                        );
                    }
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }
}

/// Spreadsheet column letters for a zero-based index (A, B, ..., Z, AA).
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Make a valid, unused sheet name.
fn sheet_name(wanted: &str, taken: &[Sheet]) -> String {
    let cleaned: String = wanted
        .chars()
        .filter(|c| !FORBIDDEN_SHEET_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let base: String = if cleaned.is_empty() {
        "Feuille".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let is_taken = |name: &str| taken.iter().any(|s| s.name.eq_ignore_ascii_case(name));
    if !is_taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        let candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn collect_sheets(report: &Report, content: &Content) -> Result<Vec<Sheet>> {
    let mut summary = Sheet::new(
        "Résumé".to_string(),
        ["Propriété".to_string(), "Valeur".to_string()],
    );
    for (label, value) in report.summary_rows() {
        summary.push(vec![Cell::text(label), Cell::Text(value)]);
    }

    let mut collector = SheetCollector {
        sheets: vec![summary],
        ..SheetCollector::default()
    };
    walk(content, &mut collector);
    if let Some(error) = collector.error {
        return Err(error);
    }

    if !collector.kpis.is_empty() {
        let mut sheet = Sheet::new(
            sheet_name("Indicateurs", &collector.sheets),
            ["Indicateur", "Valeur", "Unité", "Variation", "Tendance"]
                .into_iter()
                .map(str::to_string),
        );
        for kpi in &collector.kpis {
            sheet.push(vec![
                Cell::text(kpi.label.clone()),
                Cell::from(&kpi.value),
                kpi.unit.clone().map(Cell::Text).unwrap_or(Cell::Empty),
                kpi.change
                    .filter(|c| c.is_finite())
                    .map(Cell::Number)
                    .unwrap_or(Cell::Empty),
                Cell::text(kpi.trend().label()),
            ]);
        }
        collector.sheets.push(sheet);
    }
    Ok(collector.sheets)
}

#[derive(Default)]
struct SheetCollector {
    sheets: Vec<Sheet>,
    kpis: Vec<KpiCard>,
    tables: usize,
    charts: usize,
    error: Option<Error>,
}

impl SheetCollector {
    fn table(&mut self, section: &Section, table: &Table) -> Result<()> {
        if table.headers.is_empty() {
            return Err(Error::render(format!(
                "Tableau sans en-têtes dans la section « {} »",
                section.title
            )));
        }
        self.tables += 1;
        let mut sheet = Sheet::new(
            sheet_name(&format!("Tableau {}", self.tables), &self.sheets),
            table.headers.iter().map(|h| h.label.clone()),
        );
        for row in &table.rows {
            sheet.push(
                table
                    .headers
                    .iter()
                    .map(|h| match row.get(&h.key) {
                        // Text columns keep the authored display text.
                        Some(cell) => match (&cell.value, &cell.formatted) {
                            (CellValue::Text(_), Some(text)) => Cell::text(text.clone()),
                            (value, _) => Cell::from(value),
                        },
                        None => Cell::Empty,
                    })
                    .collect(),
            );
        }
        self.sheets.push(sheet);
        Ok(())
    }

    fn chart(&mut self, section: &Section, chart: &Chart) -> Result<()> {
        if !chart.has_data() {
            log::debug!("Skipping chart without data in section {}", section.id);
            return Ok(());
        }
        let labels = &chart.data.labels;
        if let Some(dataset) = chart
            .data
            .datasets
            .iter()
            .find(|d| d.data.len() != labels.len())
        {
            return Err(Error::render(format!(
                "Graphique « {} »: la série « {} » a {} valeurs pour {} libellés",
                chart.display_title(),
                dataset.label,
                dataset.data.len(),
                labels.len()
            )));
        }

        self.charts += 1;
        let mut sheet = Sheet::new(
            sheet_name(&format!("Graphique {}", self.charts), &self.sheets),
            std::iter::once("Libellé".to_string())
                .chain(chart.data.datasets.iter().map(|d| d.label.clone())),
        );
        for (i, label) in labels.iter().enumerate() {
            let mut row = vec![Cell::text(label.clone())];
            row.extend(
                chart
                    .data
                    .datasets
                    .iter()
                    .map(|d| Cell::from(&CellValue::Number(d.data[i]))),
            );
            sheet.push(row);
        }
        self.sheets.push(sheet);
        Ok(())
    }
}

impl ContentVisitor for SheetCollector {
    fn visit_block(&mut self, section: &Section, block: &Block) {
        if self.error.is_some() {
            return;
        }
        let outcome = match block {
            Block::Table(table) => self.table(section, table),
            Block::Chart(chart) => self.chart(section, chart),
            Block::KpiCard(kpi) => {
                self.kpis.push(kpi.clone());
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            self.error = Some(e);
        }
    }
}

fn styles_xml(header_fill: &str) -> String {
    format!(
        concat!(
            "{decl}",
            r#"<styleSheet xmlns="{ns}">"#,
            r#"<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font>"#,
            r#"<font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font></fonts>"#,
            r#"<fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
            r#"<fill><patternFill patternType="solid"><fgColor rgb="FF{fill}"/><bgColor indexed="64"/></patternFill></fill></fills>"#,
            r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
            r#"<xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/></cellXfs>"#,
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            r#"</styleSheet>"#
        ),
        decl = XML_DECLARATION,
        ns = NS_MAIN,
        fill = header_fill
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartData, Dataset, TableHeader};
    use chrono::{TimeZone, Utc};
    use std::io::{Cursor, Read};

    fn report() -> Report {
        Report::new("r1", "Bilan", Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap())
    }

    fn sales_table() -> Table {
        let mut table = Table::new(vec![
            TableHeader::new("Région", "region"),
            TableHeader::new("CA", "ca"),
        ]);
        table.push_row([CellValue::from("Nord"), CellValue::from(120)]);
        table.push_row([CellValue::from("Sud"), CellValue::from(80.5)]);
        table.push_row([CellValue::from("Est"), CellValue::from(42)]);
        table
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_sheet_name_rules() {
        let taken = vec![Sheet::new("Tableau 1".to_string(), Vec::new())];
        assert_eq!(sheet_name("Ventes [T1]: a/b", &[]), "Ventes T1 ab");
        assert_eq!(sheet_name("tableau 1", &taken), "tableau 1 (2)");
        assert_eq!(sheet_name("?*", &[]), "Feuille");

        let long = "x".repeat(40);
        assert_eq!(sheet_name(&long, &[]).chars().count(), MAX_SHEET_NAME);
        let taken = vec![Sheet::new("x".repeat(31), Vec::new())];
        let renamed = sheet_name(&long, &taken);
        assert!(renamed.ends_with(" (2)"));
        assert_eq!(renamed.chars().count(), MAX_SHEET_NAME);
    }

    #[test]
    fn test_sheets_in_document_order() {
        let chart = Chart::new(
            "bar",
            ChartData {
                labels: vec!["Jan".into(), "Fév".into()],
                datasets: vec![Dataset::new("2024", vec![1.0, 2.0])],
            },
        );
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::Table(sales_table()))
            .with_block(Block::Chart(chart))
            .with_child(
                Section::new("a1", "A1", 2)
                    .with_block(Block::KpiCard(KpiCard::new("CA", 10).with_change(-2.0)))
                    .with_block(Block::Table(sales_table())),
            )]);
        let names = XlsxRenderer::default().sheet_names(&report(), &content).unwrap();
        assert_eq!(
            names,
            vec!["Résumé", "Tableau 1", "Graphique 1", "Tableau 2", "Indicateurs"]
        );
    }

    #[test]
    fn test_no_indicator_sheet_without_kpi() {
        let content = Content::new(vec![Section::new("a", "A", 1)]);
        let names = XlsxRenderer::default().sheet_names(&report(), &content).unwrap();
        assert_eq!(names, vec!["Résumé"]);
    }

    #[test]
    fn test_malformed_blocks_fail() {
        let content = Content::new(vec![Section::new("a", "Ventes", 1)
            .with_block(Block::Table(Table::default()))]);
        let err = XlsxRenderer::default()
            .render(&report(), &content)
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert!(err.to_string().contains("Ventes"));

        let chart = Chart::new(
            "line",
            ChartData {
                labels: vec!["a".into(), "b".into()],
                datasets: vec![Dataset::new("s", vec![1.0])],
            },
        );
        let content = Content::new(vec![Section::new("a", "A", 1).with_block(Block::Chart(chart))]);
        assert!(XlsxRenderer::default().render(&report(), &content).is_err());
    }

    #[test]
    fn test_table_sheet_cells() {
        let content = Content::new(vec![
            Section::new("a", "A", 1).with_block(Block::Table(sales_table()))
        ]);
        let rendered = XlsxRenderer::default().render(&report(), &content).unwrap();
        assert_eq!(rendered.units, 2);

        let mut archive = zip::ZipArchive::new(Cursor::new(rendered.bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("xl/worksheets/sheet2.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert_eq!(xml.matches("<row ").count(), 4);
        assert!(xml.contains(r#"<c r="A1" s="1" t="inlineStr"><is><t xml:space="preserve">Région</t>"#));
        assert!(xml.contains(r#"<c r="B3"><v>80.5</v></c>"#));
        assert!(xml.contains(r#"<col min="1" max="1" width="8" customWidth="1"/>"#));
    }
}
