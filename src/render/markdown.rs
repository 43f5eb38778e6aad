//! Markdown rendering for reports.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    Alignment, Block, CalloutVariant, Chart, Content, DividerStyle, KpiCard, ListItem, ListType,
    Report, Section, Table, MAX_HEADING_LEVEL,
};
use crate::text::slugify;

use super::{DocumentRenderer, ExportOptions, Rendered};

/// Convert a report to Markdown.
pub fn to_markdown(report: &Report, content: &Content, options: &ExportOptions) -> Result<String> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render_string(report, content)
}

/// Markdown renderer.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: ExportOptions,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Render a report to a Markdown string.
    pub fn render_string(&self, report: &Report, content: &Content) -> Result<String> {
        let mut output = String::new();

        output.push_str("# ");
        output.push_str(&escape_markdown(&report.title));
        output.push_str("\n\n");

        if self.options.include_cover_page {
            self.render_metadata(&mut output, report);
        }

        if self.options.include_table_of_contents && !content.is_empty() {
            self.render_toc(&mut output, report, content);
        }

        for section in &content.sections {
            self.render_section(&mut output, section);
        }

        let theme = self.options.theme();
        output.push_str("---\n\n");
        match theme.footer_text {
            Some(ref footer) => output.push_str(&format!("*{}*\n", escape_markdown(footer))),
            None => output.push_str(&format!(
                "*Généré le {}*\n",
                self.options.generated_at().format("%d/%m/%Y")
            )),
        }

        log::debug!("Markdown: {} bytes", output.len());
        Ok(output)
    }

    fn render_metadata(&self, output: &mut String, report: &Report) {
        if !report.description.is_empty() {
            output.push_str(&escape_markdown(&report.description));
            output.push_str("\n\n");
        }
        for (label, value) in report.summary_rows().into_iter().skip(1) {
            if label == "Description" {
                continue;
            }
            output.push_str(&format!("- **{}** : {}\n", label, escape_markdown(&value)));
        }
        output.push('\n');
    }

    fn render_toc(&self, output: &mut String, report: &Report, content: &Content) {
        output.push_str("## Sommaire\n\n");
        let anchors = section_anchors(report, content);
        for (i, (section, anchor)) in content.sections.iter().zip(anchors).enumerate() {
            output.push_str(&format!(
                "{}. [{}](#{})\n",
                i + 1,
                escape_markdown(&section.title),
                anchor
            ));
        }
        output.push('\n');
    }

    fn render_section(&self, output: &mut String, section: &Section) {
        let depth = (section.depth() + 1).min(MAX_HEADING_LEVEL);
        output.push_str(&"#".repeat(depth as usize));
        output.push(' ');
        output.push_str(&escape_markdown(&section.title));
        output.push_str("\n\n");

        for block in &section.blocks {
            self.render_block(output, section, block);
        }

        for child in &section.children {
            self.render_section(output, child);
        }
    }

    fn render_block(&self, output: &mut String, section: &Section, block: &Block) {
        match block {
            Block::Paragraph { content } => {
                if content.trim().is_empty() {
                    return;
                }
                output.push_str(&escape_markdown(content));
                output.push_str("\n\n");
            }
            Block::Heading { level, content } => {
                let depth = (section.depth() + 1)
                    .saturating_add((*level).max(1))
                    .min(MAX_HEADING_LEVEL);
                output.push_str(&"#".repeat(depth as usize));
                output.push(' ');
                output.push_str(&escape_markdown(content));
                output.push_str("\n\n");
            }
            Block::List { list_type, items } => self.render_list(output, *list_type, items),
            Block::Table(table) => self.render_table(output, table),
            Block::KpiCard(kpi) => self.render_kpi(output, kpi),
            Block::Callout {
                variant,
                title,
                content,
            } => self.render_callout(output, *variant, title.as_deref(), content),
            Block::Divider { style } => match style {
                DividerStyle::Solid => output.push_str("---\n\n"),
                DividerStyle::Dashed => output.push_str("- - -\n\n"),
            },
            Block::Pagebreak => {
                output.push_str("<div style=\"page-break-after: always;\"></div>\n\n");
            }
            Block::Quote { content, author } => {
                push_quoted(output, &escape_markdown(content));
                if let Some(author) = author {
                    output.push_str(">\n");
                    output.push_str(&format!("> — {}\n", escape_markdown(author)));
                }
                output.push('\n');
            }
            Block::Chart(chart) => self.render_chart(output, chart),
            Block::Image { src, alt, caption } => {
                output.push_str(&format!(
                    "![{}]({})\n",
                    escape_markdown(alt.as_deref().unwrap_or("")),
                    src.replace(' ', "%20")
                ));
                if let Some(caption) = caption {
                    output.push_str(&format!("*{}*\n", escape_markdown(caption)));
                }
                output.push('\n');
            }
        }
    }

    fn render_list(&self, output: &mut String, list_type: ListType, items: &[ListItem]) {
        for (i, item) in items.iter().enumerate() {
            let marker = match list_type {
                ListType::Bulleted => "-".to_string(),
                ListType::Numbered => format!("{}.", i + 1),
            };
            output.push_str(&marker);
            output.push(' ');
            output.push_str(&escape_markdown(&item.content).replace('\n', " "));
            output.push('\n');
        }
        output.push('\n');
    }

    fn render_table(&self, output: &mut String, table: &Table) {
        if table.headers.is_empty() {
            return;
        }
        let labels: Vec<String> = table.headers.iter().map(|h| table_cell(&h.label)).collect();
        push_table_row(output, &labels);

        output.push('|');
        for header in &table.headers {
            let align_marker = match header.alignment() {
                Alignment::Left => " --- |",
                Alignment::Center => " :---: |",
                Alignment::Right => " ---: |",
            };
            output.push_str(align_marker);
        }
        output.push('\n');

        for row in &table.rows {
            let cells: Vec<String> = table.row_texts(row).iter().map(|c| table_cell(c)).collect();
            push_table_row(output, &cells);
        }
        output.push('\n');
    }

    fn render_kpi(&self, output: &mut String, kpi: &KpiCard) {
        output.push_str(&format!(
            "**{}** : {}",
            escape_markdown(&kpi.label),
            escape_markdown(&kpi.display_value())
        ));
        if let Some(change) = kpi.formatted_change() {
            output.push_str(&format!(" ({}, {})", change, kpi.trend().as_str()));
        }
        output.push_str("\n\n");
    }

    fn render_callout(
        &self,
        output: &mut String,
        variant: CalloutVariant,
        title: Option<&str>,
        content: &str,
    ) {
        let alert = match variant {
            CalloutVariant::Info => "NOTE",
            CalloutVariant::Warning => "WARNING",
            CalloutVariant::Success => "IMPORTANT",
            CalloutVariant::Error => "CAUTION",
            CalloutVariant::Tip => "TIP",
        };
        output.push_str(&format!("> [!{}]\n", alert));
        output.push_str(&format!(
            "> **{}**\n",
            escape_markdown(title.unwrap_or(variant.label()))
        ));
        push_quoted(output, &escape_markdown(content));
        output.push('\n');
    }

    fn render_chart(&self, output: &mut String, chart: &Chart) {
        output.push_str(&format!(
            "**{}** *(graphique {})*\n\n",
            escape_markdown(&chart.display_title()),
            escape_markdown(&chart.chart_type)
        ));
        if !chart.has_data() {
            output.push_str("*Données indisponibles*\n\n");
            return;
        }

        let mut header = vec!["Libellé".to_string()];
        header.extend(chart.data.datasets.iter().map(|d| table_cell(&d.label)));
        push_table_row(output, &header);
        output.push('|');
        output.push_str(" --- |");
        for _ in &chart.data.datasets {
            output.push_str(" ---: |");
        }
        output.push('\n');

        for (i, label) in chart.data.labels.iter().enumerate() {
            let mut cells = vec![table_cell(label)];
            cells.extend(chart.data.datasets.iter().map(|d| {
                d.data
                    .get(i)
                    .map(|v| crate::model::CellValue::Number(*v).to_string())
                    .unwrap_or_default()
            }));
            push_table_row(output, &cells);
        }
        output.push('\n');
    }
}

impl DocumentRenderer for MarkdownRenderer {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        Ok(Rendered::text(self.render_string(report, content)?))
    }
}

fn push_table_row(output: &mut String, cells: &[String]) {
    output.push('|');
    for cell in cells {
        output.push_str(&format!(" {} |", cell));
    }
    output.push('\n');
}

fn push_quoted(output: &mut String, text: &str) {
    for line in text.lines() {
        output.push('>');
        if !line.is_empty() {
            output.push(' ');
            output.push_str(line);
        }
        output.push('\n');
    }
}

fn table_cell(text: &str) -> String {
    escape_markdown(text).replace('\n', " ").trim().to_string()
}

/// Anchors of the top-level sections. Slugs are counted over every heading
/// in emission order: the report title, `Sommaire`, then each section with
/// its heading blocks and children.
fn section_anchors(report: &Report, content: &Content) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    unique_anchor(&mut seen, slugify(&report.title));
    unique_anchor(&mut seen, slugify("Sommaire"));

    let mut anchors = Vec::with_capacity(content.sections.len());
    for section in &content.sections {
        anchors.push(unique_anchor(&mut seen, slugify(&section.title)));
        count_nested_headings(&mut seen, section);
    }
    anchors
}

fn count_nested_headings(seen: &mut HashMap<String, usize>, section: &Section) {
    for block in &section.blocks {
        if let Block::Heading { content, .. } = block {
            unique_anchor(seen, slugify(content));
        }
    }
    for child in &section.children {
        unique_anchor(seen, slugify(&child.title));
        count_nested_headings(seen, child);
    }
}

/// Deduplicate anchors the way hosted Markdown viewers do (`a`, `a-1`, ...).
fn unique_anchor(seen: &mut HashMap<String, usize>, slug: String) -> String {
    let count = seen.entry(slug.clone()).or_insert(0);
    let anchor = if *count == 0 {
        slug
    } else {
        format!("{}-{}", slug, count)
    };
    *count += 1;
    anchor
}

/// Escape special Markdown characters.
/// Only escape characters that could be misinterpreted as Markdown syntax.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' | '<' | '>' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartData, Dataset, TableHeader};
    use chrono::{TimeZone, Utc};

    fn report() -> Report {
        Report::new("r1", "Bilan T1", Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap())
            .with_author("Finance")
    }

    fn options() -> ExportOptions {
        ExportOptions::new().with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
    }

    #[test]
    fn test_heading_markers_follow_depth() {
        let content = Content::new(vec![Section::new("a", "Vue d'ensemble", 1)
            .with_block(Block::heading("Points clés", 1))
            .with_child(Section::new("a1", "Détail", 2))]);
        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.starts_with("# Bilan T1\n"));
        assert!(md.contains("\n## Vue d'ensemble\n"));
        assert!(md.contains("\n### Points clés\n"));
        assert!(md.contains("\n### Détail\n"));
    }

    #[test]
    fn test_toc_uses_slugs() {
        let content = Content::new(vec![
            Section::new("a", "Résumé exécutif", 1),
            Section::new("b", "Résumé exécutif", 1),
        ]);
        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.contains("1. [Résumé exécutif](#resume-executif)"));
        assert!(md.contains("2. [Résumé exécutif](#resume-executif-1)"));
    }

    #[test]
    fn test_toc_anchors_count_every_heading() {
        let content = Content::new(vec![
            Section::new("a", "Ventes", 1)
                .with_block(Block::heading("Bilan T1", 2))
                .with_child(Section::new("a1", "Ventes", 2)),
            Section::new("b", "Ventes", 1),
            Section::new("c", "Sommaire", 1),
        ]);
        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.contains("1. [Ventes](#ventes)"));
        assert!(md.contains("2. [Ventes](#ventes-2)"));
        assert!(md.contains("3. [Sommaire](#sommaire-1)"));
    }

    #[test]
    fn test_table_columns_and_rows() {
        let mut table = Table::new(vec![
            TableHeader::new("Région", "region"),
            TableHeader::new("CA", "revenue").align(Alignment::Right),
        ]);
        table.push_row(["Nord".into(), crate::model::CellValue::from(10)]);
        table.push_row(["Sud".into(), crate::model::CellValue::from(12)]);
        let content = Content::new(vec![Section::new("a", "A", 1).with_block(Block::Table(table))]);

        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.contains("| Région | CA |\n| --- | ---: |\n| Nord | 10 |\n| Sud | 12 |\n"));
    }

    #[test]
    fn test_kpi_sign_tags() {
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::KpiCard(KpiCard::new("CA", 120).with_unit("k€").with_change(4.5)))
            .with_block(Block::KpiCard(KpiCard::new("Coûts", 80).with_change(-2.0)))]);
        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.contains("**CA** : 120 k€ (+4.5%, positive)"));
        assert!(md.contains("**Coûts** : 80 (-2.0%, negative)"));
    }

    #[test]
    fn test_callout_and_chart() {
        let chart = Chart::new(
            "bar",
            ChartData {
                labels: vec!["Jan".into(), "Fév".into()],
                datasets: vec![Dataset::new("Ventes", vec![1.0, 2.5])],
            },
        )
        .with_title("Ventes mensuelles");
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::callout(CalloutVariant::Warning, "Stock bas"))
            .with_block(Block::Chart(chart))]);
        let md = to_markdown(&report(), &content, &options()).unwrap();
        assert!(md.contains("> [!WARNING]\n> **Attention**\n> Stock bas\n"));
        assert!(md.contains("| Libellé | Ventes |"));
        assert!(md.contains("| Fév | 2.5 |"));
    }

    #[test]
    fn test_footer_is_deterministic() {
        let content = Content::default();
        let a = to_markdown(&report(), &content, &options()).unwrap();
        let b = to_markdown(&report(), &content, &options()).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with("*Généré le 05/04/2024*\n"));
    }
}
