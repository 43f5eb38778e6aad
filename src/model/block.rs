//! Block-level content types.

use super::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed content unit inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A paragraph of text
    Paragraph {
        /// Paragraph text
        content: String,
    },

    /// A heading inside a section
    Heading {
        /// Heading level (1 = most prominent)
        level: u8,
        /// Heading text
        content: String,
    },

    /// A bulleted or numbered list
    List {
        /// Marker style
        #[serde(rename = "listType")]
        list_type: ListType,
        /// List entries
        items: Vec<ListItem>,
    },

    /// A data table
    Table(Table),

    /// A key performance indicator card
    KpiCard(KpiCard),

    /// A highlighted note
    Callout {
        /// Semantic variant
        variant: CalloutVariant,
        /// Optional title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Callout body
        content: String,
    },

    /// A horizontal rule
    Divider {
        /// Line style
        #[serde(default)]
        style: DividerStyle,
    },

    /// Forced page (or slide) break
    Pagebreak,

    /// A quotation
    Quote {
        /// Quoted text
        content: String,
        /// Attribution
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },

    /// A chart with inline data
    Chart(Chart),

    /// An image reference
    Image {
        /// Image source (URL or data URL)
        src: String,
        /// Alternative text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        /// Caption shown under the image
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl Block {
    /// Create a paragraph block.
    pub fn paragraph(content: impl Into<String>) -> Self {
        Block::Paragraph {
            content: content.into(),
        }
    }

    /// Create a heading block; the level is clamped to 1..=6.
    pub fn heading(content: impl Into<String>, level: u8) -> Self {
        Block::Heading {
            level: level.clamp(1, super::MAX_HEADING_LEVEL),
            content: content.into(),
        }
    }

    /// Create a list block from plain strings.
    pub fn list<S: Into<String>>(list_type: ListType, items: impl IntoIterator<Item = S>) -> Self {
        Block::List {
            list_type,
            items: items.into_iter().map(ListItem::new).collect(),
        }
    }

    /// Create a callout block.
    pub fn callout(variant: CalloutVariant, content: impl Into<String>) -> Self {
        Block::Callout {
            variant,
            title: None,
            content: content.into(),
        }
    }

    /// Create a quote block.
    pub fn quote(content: impl Into<String>, author: Option<&str>) -> Self {
        Block::Quote {
            content: content.into(),
            author: author.map(str::to_string),
        }
    }

    /// Create an image block.
    pub fn image(src: impl Into<String>, alt: Option<&str>) -> Self {
        Block::Image {
            src: src.into(),
            alt: alt.map(str::to_string),
            caption: None,
        }
    }

    /// The serialized type tag of this block.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { .. } => "heading",
            Block::List { .. } => "list",
            Block::Table(_) => "table",
            Block::KpiCard(_) => "kpi_card",
            Block::Callout { .. } => "callout",
            Block::Divider { .. } => "divider",
            Block::Pagebreak => "pagebreak",
            Block::Quote { .. } => "quote",
            Block::Chart(_) => "chart",
            Block::Image { .. } => "image",
        }
    }
}

/// List marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    /// Bullet markers
    #[default]
    Bulleted,
    /// Decimal numbering
    Numbered,
}

/// A single list entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Entry text
    pub content: String,
}

impl ListItem {
    /// Create a list item.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Horizontal alignment of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left aligned
    #[default]
    Left,
    /// Centered
    Center,
    /// Right aligned
    Right,
}

/// A table column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHeader {
    /// Column label shown in the header row
    pub label: String,

    /// Key used to look the column up in each row
    pub key: String,

    /// Whether the authoring UI allows sorting on this column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,

    /// Column alignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,

    /// Display format hint (e.g. "currency", "percent")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl TableHeader {
    /// Create a column with the same label and key.
    pub fn new(label: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
            sortable: None,
            align: None,
            format: None,
        }
    }

    /// Set alignment and return self.
    pub fn align(mut self, alignment: Alignment) -> Self {
        self.align = Some(alignment);
        self
    }

    /// Effective alignment (left when unspecified).
    pub fn alignment(&self) -> Alignment {
        self.align.unwrap_or_default()
    }
}

/// Raw scalar value of a table cell or KPI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Empty value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Free text
    Text(String),
}

impl CellValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Check if the value is empty.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(true) => f.write_str("Oui"),
            CellValue::Bool(false) => f.write_str("Non"),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// A table cell: raw value plus optional pre-formatted display text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableCell {
    /// Raw value
    #[serde(default)]
    pub value: CellValue,

    /// Display text computed by the authoring side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

impl TableCell {
    /// Create a cell from a raw value.
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            formatted: None,
        }
    }

    /// Set the formatted text and return self.
    pub fn formatted(mut self, text: impl Into<String>) -> Self {
        self.formatted = Some(text.into());
        self
    }

    /// Text to display: the formatted text when present, else the raw value.
    pub fn display(&self) -> String {
        match &self.formatted {
            Some(text) => text.clone(),
            None => self.value.to_string(),
        }
    }
}

/// A table row, keyed by column key.
pub type TableRow = BTreeMap<String, TableCell>;

/// A data table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions, in display order
    #[serde(default)]
    pub headers: Vec<TableHeader>,

    /// Data rows
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Create a table with the given columns and no rows.
    pub fn new(headers: Vec<TableHeader>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row from values given in column order.
    pub fn push_row<V: Into<CellValue>>(&mut self, values: impl IntoIterator<Item = V>) {
        let row = self
            .headers
            .iter()
            .zip(values)
            .map(|(h, v)| (h.key.clone(), TableCell::new(v)))
            .collect();
        self.rows.push(row);
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Display text of one cell; missing keys render empty.
    pub fn cell_text(&self, row: &TableRow, header: &TableHeader) -> String {
        row.get(&header.key).map(TableCell::display).unwrap_or_default()
    }

    /// Display texts of a row in column order.
    pub fn row_texts(&self, row: &TableRow) -> Vec<String> {
        self.headers.iter().map(|h| self.cell_text(row, h)).collect()
    }
}

/// Direction of a KPI change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Favourable change
    Positive,
    /// Unfavourable change
    Negative,
    /// No significant change
    #[default]
    Neutral,
}

impl ChangeType {
    /// Style tag used by markup renderers.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Positive => "positive",
            ChangeType::Negative => "negative",
            ChangeType::Neutral => "neutral",
        }
    }

    /// Human label used in the workbook.
    pub fn label(self) -> &'static str {
        match self {
            ChangeType::Positive => "Hausse",
            ChangeType::Negative => "Baisse",
            ChangeType::Neutral => "Stable",
        }
    }

    /// Display colour.
    pub fn color(self) -> Rgb {
        match self {
            ChangeType::Positive => Rgb::new(22, 163, 74),
            ChangeType::Negative => Rgb::new(220, 38, 38),
            ChangeType::Neutral => Rgb::new(100, 116, 139),
        }
    }
}

/// A key performance indicator card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiCard {
    /// Indicator name
    pub label: String,

    /// Current value
    pub value: CellValue,

    /// Unit appended to the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Signed relative change, in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,

    /// Declared direction of the change
    #[serde(default)]
    pub change_type: ChangeType,
}

impl KpiCard {
    /// Create a KPI without change information.
    pub fn new(label: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            unit: None,
            change: None,
            change_type: ChangeType::Neutral,
        }
    }

    /// Set the unit and return self.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the change; the declared direction follows its sign.
    pub fn with_change(mut self, change: f64) -> Self {
        self.change = Some(change);
        self.change_type = if change >= 0.0 {
            ChangeType::Positive
        } else {
            ChangeType::Negative
        };
        self
    }

    /// Effective direction: derived from the sign of `change` when present.
    pub fn trend(&self) -> ChangeType {
        match self.change {
            Some(c) if c >= 0.0 => ChangeType::Positive,
            Some(_) => ChangeType::Negative,
            None => self.change_type,
        }
    }

    /// Change formatted with an explicit `+` for non-negative values.
    pub fn formatted_change(&self) -> Option<String> {
        self.change.map(|c| {
            let sign = if c >= 0.0 { '+' } else { '-' };
            format!("{}{:.1}%", sign, c.abs())
        })
    }

    /// Value followed by its unit.
    pub fn display_value(&self) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", self.value, unit),
            _ => self.value.to_string(),
        }
    }
}

/// Semantic variant of a callout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutVariant {
    /// Neutral information
    #[default]
    Info,
    /// Something needs attention
    Warning,
    /// Positive outcome
    Success,
    /// Problem
    Error,
    /// Advice
    Tip,
}

impl CalloutVariant {
    /// Variant name used as a style tag.
    pub fn as_str(self) -> &'static str {
        match self {
            CalloutVariant::Info => "info",
            CalloutVariant::Warning => "warning",
            CalloutVariant::Success => "success",
            CalloutVariant::Error => "error",
            CalloutVariant::Tip => "tip",
        }
    }

    /// Default title when the callout has none.
    pub fn label(self) -> &'static str {
        match self {
            CalloutVariant::Info => "Information",
            CalloutVariant::Warning => "Attention",
            CalloutVariant::Success => "Succès",
            CalloutVariant::Error => "Erreur",
            CalloutVariant::Tip => "Conseil",
        }
    }

    /// Accent colour of the variant.
    pub fn color(self) -> Rgb {
        match self {
            CalloutVariant::Info => Rgb::new(37, 99, 235),
            CalloutVariant::Warning => Rgb::new(217, 119, 6),
            CalloutVariant::Success => Rgb::new(22, 163, 74),
            CalloutVariant::Error => Rgb::new(220, 38, 38),
            CalloutVariant::Tip => Rgb::new(124, 58, 237),
        }
    }
}

/// Divider line style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividerStyle {
    /// Continuous line
    #[default]
    Solid,
    /// Dashed line
    Dashed,
}

/// Chart kinds with a native slide-deck mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Vertical bars
    Bar,
    /// Lines
    Line,
    /// Filled areas
    Area,
    /// Pie
    Pie,
    /// Ring
    Doughnut,
}

/// A chart with inline data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Chart type as authored (e.g. "bar", "stacked-bar", "radar")
    pub chart_type: String,

    /// Labels and series
    #[serde(default)]
    pub data: ChartData,

    /// Display configuration
    #[serde(default)]
    pub config: ChartConfig,
}

impl Chart {
    /// Create a chart.
    pub fn new(chart_type: impl Into<String>, data: ChartData) -> Self {
        Self {
            chart_type: chart_type.into(),
            data,
            config: ChartConfig::default(),
        }
    }

    /// Set the title and return self.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Map the authored type onto a native chart kind.
    ///
    /// Stacked bars are rendered as plain bars.
    pub fn kind(&self) -> Option<ChartKind> {
        match self.chart_type.to_ascii_lowercase().as_str() {
            "bar" | "stacked-bar" | "stacked_bar" | "stackedbar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "area" => Some(ChartKind::Area),
            "pie" => Some(ChartKind::Pie),
            "doughnut" | "donut" => Some(ChartKind::Doughnut),
            _ => None,
        }
    }

    /// Title or a generic fallback.
    pub fn display_title(&self) -> String {
        self.config
            .title
            .clone()
            .unwrap_or_else(|| "Graphique".to_string())
    }

    /// Whether the chart carries any data to tabulate.
    pub fn has_data(&self) -> bool {
        !self.data.labels.is_empty() && !self.data.datasets.is_empty()
    }
}

/// Chart labels and series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartData {
    /// Category labels (x axis)
    #[serde(default)]
    pub labels: Vec<String>,

    /// Data series
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

/// One chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Series name
    pub label: String,

    /// Values, one per label
    #[serde(default)]
    pub data: Vec<f64>,

    /// Series colour (hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Dataset {
    /// Create a series.
    pub fn new(label: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            data,
            color: None,
        }
    }
}

/// Chart display configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Chart title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Whether to show the legend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_deserialize_tagged() {
        let json = r#"{"type":"kpi_card","label":"CA","value":1250,"unit":"k€","change":-3.5,"changeType":"negative"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        match block {
            Block::KpiCard(kpi) => {
                assert_eq!(kpi.label, "CA");
                assert_eq!(kpi.value, CellValue::Number(1250.0));
                assert_eq!(kpi.trend(), ChangeType::Negative);
            }
            other => panic!("unexpected block {:?}", other),
        }

        let block: Block = serde_json::from_str(r#"{"type":"pagebreak"}"#).unwrap();
        assert_eq!(block, Block::Pagebreak);

        let block: Block =
            serde_json::from_str(r#"{"type":"list","listType":"numbered","items":[{"content":"a"}]}"#)
                .unwrap();
        assert_eq!(block.kind(), "list");
    }

    #[test]
    fn test_kpi_sign() {
        let up = KpiCard::new("Marge", 12.5).with_change(0.0);
        assert_eq!(up.formatted_change().as_deref(), Some("+0.0%"));
        assert_eq!(up.trend(), ChangeType::Positive);

        let down = KpiCard::new("Marge", 12.5).with_change(-2.25);
        assert_eq!(down.formatted_change().as_deref(), Some("-2.2%"));
        assert_eq!(down.trend().as_str(), "negative");

        let flat = KpiCard::new("Marge", 12.5).with_change(-0.0);
        assert_eq!(flat.formatted_change().as_deref(), Some("+0.0%"));

        // The sign wins over a contradicting declaration.
        let mut odd = KpiCard::new("Coûts", 3).with_change(4.0);
        odd.change_type = ChangeType::Negative;
        assert_eq!(odd.trend(), ChangeType::Positive);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(3.25).to_string(), "3.25");
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(TableCell::new(1200).formatted("1 200 €").display(), "1 200 €");
    }

    #[test]
    fn test_table_row_texts() {
        let mut table = Table::new(vec![
            TableHeader::new("Région", "region"),
            TableHeader::new("CA", "revenue").align(Alignment::Right),
        ]);
        table.push_row([CellValue::from("Nord"), CellValue::from(120)]);
        assert_eq!(table.row_texts(&table.rows[0]), vec!["Nord", "120"]);
        assert_eq!(table.headers[1].alignment(), Alignment::Right);
    }

    #[test]
    fn test_chart_kind_mapping() {
        let chart = Chart::new("stacked-bar", ChartData::default());
        assert_eq!(chart.kind(), Some(ChartKind::Bar));
        assert_eq!(Chart::new("radar", ChartData::default()).kind(), None);
    }
}
