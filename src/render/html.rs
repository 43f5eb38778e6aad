//! Standalone HTML rendering for reports.

use std::fmt::Write as _;

use crate::error::Result;
use crate::model::{
    Alignment, Block, Chart, Content, DividerStyle, KpiCard, ListType, Report, Section, Table,
    Theme, MAX_HEADING_LEVEL,
};
use crate::text::escape_markup as esc;

use super::{DocumentRenderer, ExportOptions, Rendered};

/// Convert a report to a standalone HTML page.
pub fn to_html(report: &Report, content: &Content, options: &ExportOptions) -> Result<String> {
    HtmlRenderer::new(options.clone()).render_string(report, content)
}

/// HTML renderer producing one self-contained page with embedded CSS.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    options: ExportOptions,
}

impl HtmlRenderer {
    /// Create a new HTML renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Render a report to an HTML string.
    pub fn render_string(&self, report: &Report, content: &Content) -> Result<String> {
        let theme = self.options.theme();
        let mut out = String::with_capacity(8 * 1024);

        out.push_str("<!DOCTYPE html>\n<html lang=\"fr\">\n<head>\n");
        out.push_str("<meta charset=\"utf-8\">\n");
        out.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        );
        let _ = writeln!(out, "<title>{}</title>", esc(&report.title));
        out.push_str("<style>\n");
        out.push_str(&stylesheet(&theme));
        out.push_str("</style>\n</head>\n<body>\n<main class=\"report\">\n");

        self.render_header(&mut out, report, &theme);

        if self.options.include_table_of_contents && !content.is_empty() {
            out.push_str("<nav class=\"toc\">\n<h2>Sommaire</h2>\n<ol>\n");
            for (i, section) in content.sections.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "<li><a href=\"#section-{}\">{}</a></li>",
                    i + 1,
                    esc(&section.title)
                );
            }
            out.push_str("</ol>\n</nav>\n");
        }

        for (i, section) in content.sections.iter().enumerate() {
            self.render_section(&mut out, section, Some(i + 1));
        }

        out.push_str("<footer class=\"report-footer\">");
        match theme.footer_text {
            Some(ref footer) => out.push_str(&esc(footer)),
            None => {
                let _ = write!(
                    out,
                    "Généré le {}",
                    self.options.generated_at().format("%d/%m/%Y")
                );
            }
        }
        out.push_str("</footer>\n</main>\n</body>\n</html>\n");

        log::debug!("HTML: {} bytes", out.len());
        Ok(out)
    }

    fn render_header(&self, out: &mut String, report: &Report, theme: &Theme) {
        out.push_str("<header class=\"report-header\">\n");
        let title = theme.cover_title.as_deref().unwrap_or(&report.title);
        let _ = writeln!(out, "<h1>{}</h1>", esc(title));
        if let Some(ref subtitle) = theme.cover_subtitle {
            let _ = writeln!(out, "<p class=\"subtitle\">{}</p>", esc(subtitle));
        }
        if !report.description.is_empty() {
            let _ = writeln!(out, "<p class=\"description\">{}</p>", esc(&report.description));
        }
        if self.options.include_cover_page {
            out.push_str("<dl class=\"metadata\">\n");
            for (label, value) in report.summary_rows().into_iter().skip(1) {
                if label == "Description" {
                    continue;
                }
                let _ = writeln!(out, "<dt>{}</dt><dd>{}</dd>", esc(label), esc(&value));
            }
            out.push_str("</dl>\n");
        }
        out.push_str("</header>\n");
    }

    fn render_section(&self, out: &mut String, section: &Section, anchor: Option<usize>) {
        match anchor {
            Some(n) => {
                let _ = writeln!(out, "<section id=\"section-{}\">", n);
            }
            None => out.push_str("<section>\n"),
        }
        let tag = (section.depth() + 1).min(MAX_HEADING_LEVEL);
        let _ = writeln!(out, "<h{tag}>{}</h{tag}>", esc(&section.title));

        for block in &section.blocks {
            self.render_block(out, block);
        }
        for child in &section.children {
            self.render_section(out, child, None);
        }
        out.push_str("</section>\n");
    }

    fn render_block(&self, out: &mut String, block: &Block) {
        match block {
            Block::Paragraph { content } => {
                let _ = writeln!(out, "<p>{}</p>", esc(content).replace('\n', "<br>"));
            }
            Block::Heading { level, content } => {
                let tag = (*level).clamp(1, MAX_HEADING_LEVEL);
                let _ = writeln!(out, "<h{tag}>{}</h{tag}>", esc(content));
            }
            Block::List { list_type, items } => {
                let tag = match list_type {
                    ListType::Bulleted => "ul",
                    ListType::Numbered => "ol",
                };
                let _ = writeln!(out, "<{}>", tag);
                for item in items {
                    let _ = writeln!(out, "<li>{}</li>", esc(&item.content));
                }
                let _ = writeln!(out, "</{}>", tag);
            }
            Block::Table(table) => render_table(out, table),
            Block::KpiCard(kpi) => render_kpi(out, kpi),
            Block::Callout {
                variant,
                title,
                content,
            } => {
                let _ = writeln!(out, "<aside class=\"callout callout-{}\">", variant.as_str());
                let _ = writeln!(
                    out,
                    "<p class=\"callout-title\">{}</p>",
                    esc(title.as_deref().unwrap_or(variant.label()))
                );
                let _ = writeln!(out, "<p>{}</p>", esc(content).replace('\n', "<br>"));
                out.push_str("</aside>\n");
            }
            Block::Divider { style } => match style {
                DividerStyle::Solid => out.push_str("<hr>\n"),
                DividerStyle::Dashed => out.push_str("<hr class=\"dashed\">\n"),
            },
            Block::Pagebreak => out.push_str("<div class=\"pagebreak\"></div>\n"),
            Block::Quote { content, author } => {
                out.push_str("<blockquote>\n");
                let _ = writeln!(out, "<p>{}</p>", esc(content));
                if let Some(author) = author {
                    let _ = writeln!(out, "<cite>— {}</cite>", esc(author));
                }
                out.push_str("</blockquote>\n");
            }
            Block::Chart(chart) => render_chart(out, chart),
            Block::Image { src, alt, caption } => {
                out.push_str("<figure class=\"image\">\n");
                let _ = writeln!(
                    out,
                    "<img src=\"{}\" alt=\"{}\">",
                    esc(src),
                    esc(alt.as_deref().unwrap_or(""))
                );
                if let Some(caption) = caption {
                    let _ = writeln!(out, "<figcaption>{}</figcaption>", esc(caption));
                }
                out.push_str("</figure>\n");
            }
        }
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        Ok(Rendered::text(self.render_string(report, content)?))
    }
}

fn align_attr(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "",
        Alignment::Center => " class=\"center\"",
        Alignment::Right => " class=\"right\"",
    }
}

fn render_table(out: &mut String, table: &Table) {
    if table.headers.is_empty() {
        log::debug!("Skipping table without headers");
        return;
    }
    out.push_str("<table>\n<thead>\n<tr>");
    for header in &table.headers {
        let _ = write!(
            out,
            "<th{}>{}</th>",
            align_attr(header.alignment()),
            esc(&header.label)
        );
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");
    for row in &table.rows {
        out.push_str("<tr>");
        for header in &table.headers {
            let _ = write!(
                out,
                "<td{}>{}</td>",
                align_attr(header.alignment()),
                esc(&table.cell_text(row, header))
            );
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
}

fn render_kpi(out: &mut String, kpi: &KpiCard) {
    let _ = writeln!(out, "<div class=\"kpi kpi-{}\">", kpi.trend().as_str());
    let _ = writeln!(out, "<span class=\"kpi-label\">{}</span>", esc(&kpi.label));
    let _ = writeln!(
        out,
        "<span class=\"kpi-value\">{}</span>",
        esc(&kpi.display_value())
    );
    if let Some(change) = kpi.formatted_change() {
        let _ = writeln!(out, "<span class=\"kpi-change\">{}</span>", esc(&change));
    }
    out.push_str("</div>\n");
}

fn render_chart(out: &mut String, chart: &Chart) {
    let _ = writeln!(
        out,
        "<figure class=\"chart\" data-chart-type=\"{}\">",
        esc(&chart.chart_type)
    );
    let _ = writeln!(out, "<figcaption>{}</figcaption>", esc(&chart.display_title()));
    if chart.has_data() {
        out.push_str("<table>\n<thead>\n<tr><th>Libellé</th>");
        for dataset in &chart.data.datasets {
            let _ = write!(out, "<th class=\"right\">{}</th>", esc(&dataset.label));
        }
        out.push_str("</tr>\n</thead>\n<tbody>\n");
        for (i, label) in chart.data.labels.iter().enumerate() {
            let _ = write!(out, "<tr><td>{}</td>", esc(label));
            for dataset in &chart.data.datasets {
                let value = dataset
                    .data
                    .get(i)
                    .map(|v| crate::model::CellValue::Number(*v).to_string())
                    .unwrap_or_default();
                let _ = write!(out, "<td class=\"right\">{}</td>", value);
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
    } else {
        out.push_str("<p class=\"muted\">Données indisponibles</p>\n");
    }
    out.push_str("</figure>\n");
}

fn stylesheet(theme: &Theme) -> String {
    let mut css = String::new();
    let _ = writeln!(
        css,
        ":root {{ --primary: {}; --secondary: {}; --accent: {}; --zebra: {}; }}",
        theme.primary.to_css(),
        theme.secondary.to_css(),
        theme.accent.to_css(),
        crate::model::Rgb::ZEBRA.to_css()
    );
    let _ = writeln!(
        css,
        "body {{ font-family: Helvetica, Arial, sans-serif; font-size: {}pt; color: {}; margin: 0; }}",
        theme.base_font_size,
        crate::model::Rgb::TEXT.to_css()
    );
    css.push_str(
        ".report { max-width: 960px; margin: 0 auto; padding: 2rem; }\n\
         h1, h2, h3, h4, h5, h6 { color: var(--primary); }\n\
         .report-header { border-bottom: 3px solid var(--primary); margin-bottom: 2rem; }\n\
         .subtitle, .muted { color: var(--secondary); }\n\
         .metadata { display: grid; grid-template-columns: max-content 1fr; gap: .25rem 1rem; }\n\
         .metadata dt { font-weight: bold; }\n\
         .toc ol { padding-left: 1.5rem; }\n\
         table { border-collapse: collapse; width: 100%; margin: 1rem 0; }\n\
         th { background: var(--primary); color: #fff; text-align: left; }\n\
         th, td { padding: .4rem .6rem; border: 1px solid #e2e8f0; }\n\
         tbody tr:nth-child(even) { background: var(--zebra); }\n\
         .right { text-align: right; }\n\
         .center { text-align: center; }\n\
         .kpi { display: inline-flex; flex-direction: column; min-width: 12rem; padding: 1rem; margin: .5rem; border-left: 4px solid var(--secondary); background: var(--zebra); }\n\
         .kpi-label { font-size: .85em; color: var(--secondary); }\n\
         .kpi-value { font-size: 1.6em; font-weight: bold; }\n",
    );
    for (class, color) in [
        ("positive", crate::model::ChangeType::Positive.color()),
        ("negative", crate::model::ChangeType::Negative.color()),
        ("neutral", crate::model::ChangeType::Neutral.color()),
    ] {
        let _ = writeln!(
            css,
            ".kpi-{class} {{ border-left-color: {c}; }} .kpi-{class} .kpi-change {{ color: {c}; }}",
            c = color.to_css()
        );
    }
    css.push_str(".callout { padding: .75rem 1rem; margin: 1rem 0; border-left: 4px solid; }\n");
    css.push_str(".callout-title { font-weight: bold; margin: 0 0 .25rem; }\n");
    for variant in [
        crate::model::CalloutVariant::Info,
        crate::model::CalloutVariant::Warning,
        crate::model::CalloutVariant::Success,
        crate::model::CalloutVariant::Error,
        crate::model::CalloutVariant::Tip,
    ] {
        let color = variant.color();
        let _ = writeln!(
            css,
            ".callout-{} {{ border-color: {}; background: {}; }}",
            variant.as_str(),
            color.to_css(),
            color.lighten(0.9).to_css()
        );
    }
    css.push_str(
        "hr { border: 0; border-top: 1px solid #cbd5e1; }\n\
         hr.dashed { border-top-style: dashed; }\n\
         blockquote { margin: 1rem 0; padding-left: 1rem; border-left: 3px solid var(--accent); font-style: italic; }\n\
         figure { margin: 1rem 0; }\n\
         figure img { max-width: 100%; }\n\
         figcaption { font-weight: bold; color: var(--secondary); }\n\
         .pagebreak { break-after: page; }\n\
         .report-footer { margin-top: 3rem; font-size: .8em; color: var(--secondary); }\n\
         @media print { .report { max-width: none; } }\n",
    );
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CalloutVariant, CellValue, TableHeader};
    use chrono::{TimeZone, Utc};

    fn render(content: &Content) -> String {
        let created = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
        let report = Report::new("r1", "Bilan <T1>", created);
        let options = ExportOptions::new()
            .with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap());
        to_html(&report, content, &options).unwrap()
    }

    #[test]
    fn test_title_is_escaped() {
        let html = render(&Content::default());
        assert!(html.contains("<title>Bilan &lt;T1&gt;</title>"));
        assert!(html.contains("<h1>Bilan &lt;T1&gt;</h1>"));
        assert!(!html.contains("<nav"));
    }

    #[test]
    fn test_toc_anchors_by_index() {
        let content = Content::new(vec![
            Section::new("a", "Ventes & marges", 1).with_child(Section::new("a1", "Nord", 2)),
            Section::new("b", "Perspectives", 1),
        ]);
        let html = render(&content);
        assert!(html.contains("<a href=\"#section-1\">Ventes &amp; marges</a>"));
        assert!(html.contains("<a href=\"#section-2\">Perspectives</a>"));
        assert!(html.contains("<section id=\"section-2\">"));
        assert!(html.contains("<h2>Ventes &amp; marges</h2>"));
        assert!(html.contains("<h3>Nord</h3>"));
        assert_eq!(html.matches("<li><a href").count(), 2);
    }

    #[test]
    fn test_blocks() {
        let mut table = Table::new(vec![
            TableHeader::new("Région", "region"),
            TableHeader::new("CA", "ca").align(Alignment::Right),
        ]);
        table.push_row([CellValue::from("Nord"), CellValue::from(3)]);
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::heading("Détail", 2))
            .with_block(Block::Table(table))
            .with_block(Block::KpiCard(KpiCard::new("CA", 10).with_change(-1.5)))
            .with_block(Block::callout(CalloutVariant::Tip, "Pensez-y"))
            .with_block(Block::quote("Il l'a dit", Some("Marie")))]);
        let html = render(&content);
        assert!(html.contains("<h2>Détail</h2>"));
        assert!(html.contains("<th class=\"right\">CA</th>"));
        assert!(html.contains("<td>Nord</td><td class=\"right\">3</td>"));
        assert!(html.contains("<div class=\"kpi kpi-negative\">"));
        assert!(html.contains("<span class=\"kpi-change\">-1.5%</span>"));
        assert!(html.contains("<aside class=\"callout callout-tip\">"));
        assert!(html.contains("Il l&#39;a dit"));
        assert!(html.contains("<cite>— Marie</cite>"));
    }

    #[test]
    fn test_table_without_headers_is_skipped() {
        let mut table = Table::default();
        table.rows.push(Default::default());
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::Table(table))
            .with_block(Block::paragraph("Suite"))]);
        let html = render(&content);
        assert!(!html.contains("<table>"));
        assert!(!html.contains("<thead>"));
        assert!(html.contains("<p>Suite</p>"));
    }
}
