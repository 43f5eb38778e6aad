//! Word (DOCX) rendering.
//!
//! Produces a WordprocessingML package: the body is written while walking
//! the section tree; styles, numbering definitions, the footer and page
//! geometry are generated around it. Word paginates the flow itself, so
//! the unit count reported is the number of forced page starts.

use std::fmt::Write as _;

use crate::error::Result;
use crate::layout::{mm_to_twips, PageGeometry};
use crate::model::{
    Alignment, Block, CalloutVariant, Chart, Content, DividerStyle, KpiCard, ListItem, ListType,
    Report, Rgb, Section, Table, Theme, MAX_HEADING_LEVEL,
};
use crate::text::escape_xml;

use super::chart::{embed_image, Embed};
use super::package::{
    theme_xml, Package, Relationships, REL_IMAGE, REL_STYLES, REL_THEME, XML_DECLARATION,
};
use super::visitor::{outline, walk, ContentVisitor};
use super::{DocumentRenderer, ExportOptions, Rendered};

const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const CT_NUMBERING: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
const CT_SETTINGS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml";
const CT_FOOTER: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml";

const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
const REL_SETTINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";
const REL_FOOTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

const NS_DOCUMENT: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
    r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
    r#" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing""#,
    r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
    r#" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#
);

/// Bullet list numbering instance; numbered lists get their own instances
/// starting at 2 so each one restarts at 1.
const BULLET_NUM_ID: u32 = 1;
const EMU_PER_MM: f32 = 36_000.0;

/// Convert a report to DOCX bytes.
pub fn to_docx(report: &Report, content: &Content, options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(DocxRenderer::new(options.clone()).render(report, content)?.bytes)
}

/// Word document renderer.
#[derive(Debug, Clone, Default)]
pub struct DocxRenderer {
    options: ExportOptions,
}

impl DocxRenderer {
    /// Create a new DOCX renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }
}

impl DocumentRenderer for DocxRenderer {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        let theme = self.options.theme();
        let geometry = self.options.page_geometry();
        let generated_at = self.options.generated_at();

        let mut rels = Relationships::new();
        rels.add(REL_STYLES, "styles.xml");
        rels.add(REL_NUMBERING, "numbering.xml");
        rels.add(REL_SETTINGS, "settings.xml");
        rels.add(REL_THEME, "theme/theme1.xml");
        let footer_rel = rels.add(REL_FOOTER, "footer1.xml");

        let mut writer = BodyWriter::new(&theme, geometry, rels);
        if self.options.include_cover_page {
            writer.cover(report, &generated_at.format("%d/%m/%Y").to_string());
        }
        if self.options.include_table_of_contents && !content.is_empty() {
            writer.table_of_contents(content);
        }
        walk(content, &mut writer);

        let units = writer.page_starts;
        let mut document = String::with_capacity(writer.body.len() + 1024);
        document.push_str(XML_DECLARATION);
        let _ = write!(document, "<w:document {}><w:body>", NS_DOCUMENT);
        document.push_str(&writer.body);
        document.push_str(&section_properties(&geometry, &footer_rel));
        document.push_str("</w:body></w:document>");

        let mut package = Package::new();
        package.add_package_metadata("word/document.xml", report, &generated_at, "rapport")?;
        package.add_part("word/document.xml", CT_DOCUMENT, document)?;
        package.add_part("word/styles.xml", CT_STYLES, styles_xml(&theme))?;
        package.add_part(
            "word/numbering.xml",
            CT_NUMBERING,
            numbering_xml(writer.numbered_lists),
        )?;
        package.add_part("word/settings.xml", CT_SETTINGS, settings_xml())?;
        package.add_part(
            "word/footer1.xml",
            CT_FOOTER,
            footer_xml(theme.footer_text.as_deref(), mm_to_twips(geometry.content_width())),
        )?;
        package.add_part(
            "word/theme/theme1.xml",
            super::package::CT_THEME,
            theme_xml(
                &theme.primary.to_hex(),
                &theme.secondary.to_hex(),
                &theme.accent.to_hex(),
            ),
        )?;
        for (name, part) in &writer.media {
            package.add_default(part.extension, image_content_type(part.extension));
            package.add_raw(&format!("word/media/{}", name), &part.bytes)?;
        }
        package.add_raw("word/_rels/document.xml.rels", writer.rels.to_xml())?;

        log::debug!(
            "DOCX: {} page starts, {} images",
            units,
            writer.media.len()
        );
        Ok(Rendered::new(package.finish()?, units))
    }
}

fn image_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

/// Accumulates the document body.
struct BodyWriter<'a> {
    theme: &'a Theme,
    geometry: PageGeometry,
    rels: Relationships,
    body: String,
    media: Vec<(String, super::chart::ImagePart)>,
    numbered_lists: u32,
    drawing_ids: u32,
    page_starts: usize,
}

impl<'a> BodyWriter<'a> {
    fn new(theme: &'a Theme, geometry: PageGeometry, rels: Relationships) -> Self {
        Self {
            theme,
            geometry,
            rels,
            body: String::with_capacity(16 * 1024),
            media: Vec::new(),
            numbered_lists: 0,
            drawing_ids: 0,
            page_starts: 1,
        }
    }

    fn paragraph(&mut self, properties: &str, runs: &str) {
        let _ = write!(self.body, "<w:p><w:pPr>{}</w:pPr>{}</w:p>", properties, runs);
    }

    fn styled(&mut self, style: &str, text: &str) {
        let runs = run(text, "");
        self.paragraph(&format!(r#"<w:pStyle w:val="{}"/>"#, style), &runs);
    }

    fn page_break(&mut self) {
        self.body
            .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        self.page_starts += 1;
    }

    fn cover(&mut self, report: &Report, generated_on: &str) {
        let theme = self.theme;
        self.styled("Title", theme.cover_title.as_deref().unwrap_or(&report.title));
        if let Some(subtitle) = theme.cover_subtitle.as_deref() {
            self.styled("Subtitle", subtitle);
        } else if !report.period_label.is_empty() {
            self.styled("Subtitle", &report.period_label);
        }
        if !report.description.is_empty() {
            let runs = run(&report.description, "<w:i/>");
            self.paragraph("", &runs);
        }
        for (label, value) in report.summary_rows().into_iter().skip(1) {
            if label == "Description" {
                continue;
            }
            let runs = format!(
                "{}{}",
                run(
                    &format!("{} : ", label),
                    &format!(r#"<w:b/><w:color w:val="{}"/>"#, theme.secondary.to_hex())
                ),
                run(&value, "")
            );
            self.paragraph(r#"<w:spacing w:after="60"/>"#, &runs);
        }
        let runs = run(
            &format!("Généré le {}", generated_on),
            &format!(r#"<w:color w:val="{}"/><w:sz w:val="18"/>"#, Rgb::MUTED.to_hex()),
        );
        self.paragraph(r#"<w:spacing w:before="480"/>"#, &runs);
        self.page_break();
    }

    fn table_of_contents(&mut self, content: &Content) {
        self.styled("TOCHeading", "Sommaire");

        // A TOC field Word refreshes on open; the cached result lists the
        // sections for viewers that do not update fields.
        self.body.push_str(concat!(
            r#"<w:p><w:r><w:fldChar w:fldCharType="begin" w:dirty="true"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve"> TOC \o "1-2" \h \z \u </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r></w:p>"#
        ));
        for entry in outline(content, 2) {
            let style = if entry.depth > 1 { "TOC2" } else { "TOC1" };
            let runs = run(&format!("{}  {}", entry.number, entry.title), "");
            self.paragraph(&format!(r#"<w:pStyle w:val="{}"/>"#, style), &runs);
        }
        self.body
            .push_str(r#"<w:p><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#);
        self.page_break();
    }

    fn list(&mut self, list_type: ListType, items: &[ListItem]) {
        let num_id = match list_type {
            ListType::Bulleted => BULLET_NUM_ID,
            ListType::Numbered => {
                self.numbered_lists += 1;
                BULLET_NUM_ID + self.numbered_lists
            }
        };
        for item in items {
            let properties = format!(
                r#"<w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{}"/></w:numPr>"#,
                num_id
            );
            let runs = run(&item.content, "");
            self.paragraph(&properties, &runs);
        }
    }

    fn table(&mut self, table: &Table) {
        if table.headers.is_empty() {
            log::debug!("Skipping table without headers");
            return;
        }
        let total = mm_to_twips(self.geometry.content_width());
        let column = total / table.headers.len() as u32;
        let primary = self.theme.primary.to_hex();

        let _ = write!(
            self.body,
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="RapportTable"/><w:tblW w:w="{}" w:type="dxa"/><w:tblLayout w:type="fixed"/></w:tblPr><w:tblGrid>"#,
            column * table.headers.len() as u32
        );
        for _ in &table.headers {
            let _ = write!(self.body, r#"<w:gridCol w:w="{}"/>"#, column);
        }
        self.body.push_str("</w:tblGrid>");

        self.body
            .push_str(r#"<w:tr><w:trPr><w:tblHeader/></w:trPr>"#);
        for header in &table.headers {
            let cell = table_cell(
                column,
                Some(&primary),
                header.alignment(),
                &run(&header.label, r#"<w:b/><w:color w:val="FFFFFF"/>"#),
            );
            self.body.push_str(&cell);
        }
        self.body.push_str("</w:tr>");

        let zebra = Rgb::ZEBRA.to_hex();
        for (i, row) in table.rows.iter().enumerate() {
            self.body.push_str("<w:tr>");
            let fill = (i % 2 == 1).then_some(zebra.as_str());
            for header in &table.headers {
                let text = table.cell_text(row, header);
                let cell = table_cell(column, fill, header.alignment(), &run(&text, ""));
                self.body.push_str(&cell);
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
        // Word merges adjacent tables without a paragraph between them.
        self.body.push_str("<w:p/>");
    }

    fn kpi(&mut self, kpi: &KpiCard) {
        let trend = kpi.trend();
        let border = format!(
            r#"<w:pBdr><w:left w:val="single" w:sz="24" w:space="8" w:color="{}"/></w:pBdr><w:shd w:val="clear" w:color="auto" w:fill="{}"/><w:ind w:left="200"/>"#,
            trend.color().to_hex(),
            Rgb::ZEBRA.to_hex()
        );
        let label = run(
            &kpi.label,
            &format!(r#"<w:color w:val="{}"/><w:sz w:val="18"/>"#, Rgb::MUTED.to_hex()),
        );
        self.paragraph(&format!(r#"{}<w:spacing w:after="0"/>"#, border), &label);

        let mut runs = run(&kpi.display_value(), r#"<w:b/><w:sz w:val="32"/>"#);
        if let Some(change) = kpi.formatted_change() {
            runs.push_str(&run(
                &format!("  {}", change),
                &format!(r#"<w:b/><w:color w:val="{}"/>"#, trend.color().to_hex()),
            ));
        }
        self.paragraph(&border, &runs);
    }

    fn callout(&mut self, variant: CalloutVariant, title: Option<&str>, content: &str) {
        let color = variant.color();
        let frame = format!(
            r#"<w:pBdr><w:left w:val="single" w:sz="24" w:space="8" w:color="{}"/></w:pBdr><w:shd w:val="clear" w:color="auto" w:fill="{}"/><w:ind w:left="200"/>"#,
            color.to_hex(),
            color.lighten(0.9).to_hex()
        );
        let heading = run(
            title.unwrap_or(variant.label()),
            &format!(r#"<w:b/><w:color w:val="{}"/>"#, color.to_hex()),
        );
        self.paragraph(&format!(r#"{}<w:spacing w:after="0"/>"#, frame), &heading);
        let body = run(content, "");
        self.paragraph(&frame, &body);
    }

    fn divider(&mut self, style: DividerStyle) {
        let line = match style {
            DividerStyle::Solid => "single",
            DividerStyle::Dashed => "dashed",
        };
        let properties = format!(
            r#"<w:pBdr><w:bottom w:val="{}" w:sz="6" w:space="1" w:color="{}"/></w:pBdr>"#,
            line,
            self.theme.secondary.lighten(0.5).to_hex()
        );
        self.paragraph(&properties, "");
    }

    fn quote(&mut self, content: &str, author: Option<&str>) {
        let runs = run(content, "");
        self.paragraph(r#"<w:pStyle w:val="Quote"/>"#, &runs);
        if let Some(author) = author {
            let runs = run(&format!("— {}", author), "");
            self.paragraph(r#"<w:pStyle w:val="Quote"/><w:jc w:val="right"/>"#, &runs);
        }
    }

    fn chart(&mut self, chart: &Chart) {
        self.styled("Caption", &chart.display_title());
        if !chart.has_data() {
            let runs = run("Données indisponibles", "<w:i/>");
            self.paragraph("", &runs);
            return;
        }
        // Charts are exported as their data table.
        let mut table = Table::new(
            std::iter::once(crate::model::TableHeader::new("Libellé", "label"))
                .chain(chart.data.datasets.iter().enumerate().map(|(i, d)| {
                    crate::model::TableHeader::new(d.label.clone(), format!("s{}", i))
                        .align(Alignment::Right)
                }))
                .collect(),
        );
        for (i, label) in chart.data.labels.iter().enumerate() {
            let mut row = crate::model::TableRow::new();
            row.insert("label".to_string(), crate::model::TableCell::new(label.as_str()));
            for (s, dataset) in chart.data.datasets.iter().enumerate() {
                if let Some(value) = dataset.data.get(i) {
                    row.insert(format!("s{}", s), crate::model::TableCell::new(*value));
                }
            }
            table.rows.push(row);
        }
        self.table(&table);
    }

    fn image(&mut self, src: &str, alt: Option<&str>, caption: Option<&str>) {
        match embed_image(src) {
            Embed::Native(part) => {
                self.drawing_ids += 1;
                let id = self.drawing_ids;
                let name = format!("image{}.{}", id, part.extension);
                let rel = self.rels.add(REL_IMAGE, &format!("media/{}", name));

                let max_width = self.geometry.content_width();
                let (width, height) = match part.pixel_size.filter(|&(w, h)| w > 0 && h > 0) {
                    Some((w, h)) => {
                        let ratio = h as f32 / w as f32;
                        let width = max_width.min(w as f32 * 25.4 / 96.0);
                        let height = (width * ratio).min(120.0);
                        (height / ratio, height)
                    }
                    None => (max_width, max_width * 0.5625),
                };
                let (cx, cy) = ((width * EMU_PER_MM) as i64, (height * EMU_PER_MM) as i64);
                let descr = escape_xml(alt.unwrap_or(""));
                let _ = write!(
                    self.body,
                    concat!(
                        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#,
                        r#"<wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/>"#,
                        r#"<wp:docPr id="{id}" name="Image {id}" descr="{descr}"/>"#,
                        r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                        r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                        r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                        r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                        r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                        r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
                    ),
                    cx = cx,
                    cy = cy,
                    id = id,
                    descr = descr,
                    name = name,
                    rel = rel
                );
                self.media.push((name, part));
            }
            Embed::Placeholder(failure) => {
                log::debug!("Image kept as placeholder: {}", failure);
                let label = match alt {
                    Some(alt) if !alt.is_empty() => format!("[Image] {}", alt),
                    _ => "[Image]".to_string(),
                };
                let runs = run(&label, &format!(r#"<w:i/><w:color w:val="{}"/>"#, Rgb::MUTED.to_hex()));
                if src.starts_with("http://") || src.starts_with("https://") {
                    let rel = self.rels.add_external(REL_HYPERLINK, src);
                    let link = format!(r#"<w:hyperlink r:id="{}">{}</w:hyperlink>"#, rel, runs);
                    self.paragraph(r#"<w:jc w:val="center"/>"#, &link);
                } else {
                    self.paragraph(r#"<w:jc w:val="center"/>"#, &runs);
                }
            }
        }
        if let Some(caption) = caption {
            self.styled("Caption", caption);
        }
    }
}

impl ContentVisitor for BodyWriter<'_> {
    fn enter_section(&mut self, section: &Section, _path: &[usize]) {
        let style = format!("Heading{}", section.depth());
        self.styled(&style, &section.title);
    }

    fn visit_block(&mut self, section: &Section, block: &Block) {
        match block {
            Block::Paragraph { content } => {
                let runs = run(content, "");
                self.paragraph("", &runs);
            }
            Block::Heading { level, content } => {
                let depth = section
                    .depth()
                    .saturating_add((*level).max(1))
                    .min(MAX_HEADING_LEVEL);
                self.styled(&format!("Heading{}", depth), content);
            }
            Block::List { list_type, items } => self.list(*list_type, items),
            Block::Table(table) => self.table(table),
            Block::KpiCard(kpi) => self.kpi(kpi),
            Block::Callout {
                variant,
                title,
                content,
            } => self.callout(*variant, title.as_deref(), content),
            Block::Divider { style } => self.divider(*style),
            Block::Pagebreak => self.page_break(),
            Block::Quote { content, author } => self.quote(content, author.as_deref()),
            Block::Chart(chart) => self.chart(chart),
            Block::Image { src, alt, caption } => {
                self.image(src, alt.as_deref(), caption.as_deref())
            }
        }
    }
}

/// A text run; newlines become line breaks.
fn run(text: &str, properties: &str) -> String {
    let mut out = String::from("<w:r>");
    if !properties.is_empty() {
        let _ = write!(out, "<w:rPr>{}</w:rPr>", properties);
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        let _ = write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, escape_xml(line));
    }
    out.push_str("</w:r>");
    out
}

fn table_cell(width: u32, fill: Option<&str>, alignment: Alignment, runs: &str) -> String {
    let shading = fill
        .map(|f| format!(r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#, f))
        .unwrap_or_default();
    let jc = match alignment {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
    };
    format!(
        r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/>{}</w:tcPr><w:p><w:pPr><w:spacing w:after="0"/><w:jc w:val="{}"/></w:pPr>{}</w:p></w:tc>"#,
        width, shading, jc, runs
    )
}

fn section_properties(geometry: &PageGeometry, footer_rel: &str) -> String {
    let orient = if geometry.width > geometry.height {
        r#" w:orient="landscape""#
    } else {
        ""
    };
    format!(
        concat!(
            r#"<w:sectPr><w:footerReference w:type="default" r:id="{}"/>"#,
            r#"<w:pgSz w:w="{}" w:h="{}"{}/>"#,
            r#"<w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="708" w:footer="{}" w:gutter="0"/>"#,
            r#"</w:sectPr>"#
        ),
        footer_rel,
        mm_to_twips(geometry.width),
        mm_to_twips(geometry.height),
        orient,
        mm_to_twips(geometry.margins.top),
        mm_to_twips(geometry.margins.right),
        mm_to_twips(geometry.margins.bottom),
        mm_to_twips(geometry.margins.left),
        mm_to_twips(geometry.margins.bottom / 2.0),
    )
}

fn footer_xml(footer_text: Option<&str>, tab_position: u32) -> String {
    let mut xml = String::from(XML_DECLARATION);
    let _ = write!(
        xml,
        r#"<w:ftr {}><w:p><w:pPr><w:pStyle w:val="Footer"/><w:tabs><w:tab w:val="right" w:pos="{}"/></w:tabs></w:pPr>"#,
        NS_DOCUMENT, tab_position
    );
    if let Some(text) = footer_text {
        xml.push_str(&run(text, "<w:i/>"));
    }
    xml.push_str(concat!(
        r#"<w:r><w:tab/></w:r><w:r><w:t xml:space="preserve">Page </w:t></w:r>"#,
        r#"<w:fldSimple w:instr=" PAGE "><w:r><w:t>1</w:t></w:r></w:fldSimple>"#,
        r#"<w:r><w:t xml:space="preserve"> / </w:t></w:r>"#,
        r#"<w:fldSimple w:instr=" NUMPAGES "><w:r><w:t>1</w:t></w:r></w:fldSimple>"#,
        r#"</w:p></w:ftr>"#
    ));
    xml
}

fn settings_xml() -> String {
    format!(
        r#"{}<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:updateFields w:val="true"/><w:defaultTabStop w:val="708"/><w:characterSpacingControl w:val="doNotCompress"/></w:settings>"#,
        XML_DECLARATION
    )
}

fn numbering_xml(numbered_lists: u32) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(
        r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    xml.push_str(concat!(
        r#"<w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/>"#,
        r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/>"#,
        r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#,
        r#"<w:abstractNum w:abstractNumId="1"><w:multiLevelType w:val="singleLevel"/>"#,
        r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/>"#,
        r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#
    ));
    let _ = write!(
        xml,
        r#"<w:num w:numId="{}"><w:abstractNumId w:val="0"/></w:num>"#,
        BULLET_NUM_ID
    );
    for n in 1..=numbered_lists {
        let _ = write!(
            xml,
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="1"/><w:lvlOverride w:ilvl="0"><w:startOverride w:val="1"/></w:lvlOverride></w:num>"#,
            BULLET_NUM_ID + n
        );
    }
    xml.push_str("</w:numbering>");
    xml
}

fn styles_xml(theme: &Theme) -> String {
    let primary = theme.primary.to_hex();
    let secondary = theme.secondary.to_hex();
    let accent = theme.accent.to_hex();
    let text = Rgb::TEXT.to_hex();
    let body_size = (theme.base_font_size * 2.0).round() as u32;

    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(
        r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    let _ = write!(
        xml,
        concat!(
            r#"<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/>"#,
            r#"<w:color w:val="{text}"/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/><w:lang w:val="fr-FR"/></w:rPr></w:rPrDefault>"#,
            r#"<w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>"#,
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
            r#"<w:pPr><w:spacing w:before="2400" w:after="240"/></w:pPr><w:rPr><w:b/><w:color w:val="{primary}"/><w:sz w:val="56"/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Subtitle"><w:name w:val="Subtitle"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
            r#"<w:pPr><w:spacing w:after="480"/></w:pPr><w:rPr><w:color w:val="{secondary}"/><w:sz w:val="32"/></w:rPr></w:style>"#
        ),
        text = text,
        size = body_size,
        primary = primary,
        secondary = secondary
    );

    for level in 1..=MAX_HEADING_LEVEL {
        let size = ((20.0 - 4.0 * f32::from(level - 1)).max(12.0) * 2.0) as u32;
        let _ = write!(
            xml,
            concat!(
                r#"<w:style w:type="paragraph" w:styleId="Heading{l}"><w:name w:val="heading {l}"/>"#,
                r#"<w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
                r#"<w:pPr><w:keepNext/><w:keepLines/><w:spacing w:before="{before}" w:after="120"/><w:outlineLvl w:val="{o}"/></w:pPr>"#,
                r#"<w:rPr><w:b/><w:color w:val="{primary}"/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr></w:style>"#
            ),
            l = level,
            o = level - 1,
            before = if level == 1 { 360 } else { 240 },
            primary = primary,
            size = size
        );
    }

    let _ = write!(
        xml,
        concat!(
            r#"<w:style w:type="paragraph" w:styleId="TOCHeading"><w:name w:val="TOC Heading"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>"#,
            r#"<w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:color w:val="{primary}"/><w:sz w:val="40"/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="TOC1"><w:name w:val="toc 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>"#,
            r#"<w:pPr><w:spacing w:after="60"/></w:pPr><w:rPr><w:b/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="TOC2"><w:name w:val="toc 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>"#,
            r#"<w:pPr><w:spacing w:after="60"/><w:ind w:left="440"/></w:pPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/>"#,
            r#"<w:pPr><w:spacing w:after="60"/><w:ind w:left="720"/><w:contextualSpacing/></w:pPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>"#,
            r#"<w:pPr><w:pBdr><w:left w:val="single" w:sz="18" w:space="8" w:color="{accent}"/></w:pBdr><w:ind w:left="360"/></w:pPr>"#,
            r#"<w:rPr><w:i/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Caption"><w:name w:val="caption"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/>"#,
            r#"<w:rPr><w:b/><w:color w:val="{secondary}"/><w:sz w:val="18"/></w:rPr></w:style>"#,
            r#"<w:style w:type="paragraph" w:styleId="Footer"><w:name w:val="footer"/><w:basedOn w:val="Normal"/>"#,
            r#"<w:rPr><w:color w:val="{secondary}"/><w:sz w:val="16"/></w:rPr></w:style>"#,
            r#"<w:style w:type="table" w:styleId="RapportTable"><w:name w:val="Rapport Table"/><w:tblPr>"#,
            r#"<w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/><w:left w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/>"#,
            r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/><w:right w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/>"#,
            r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="E2E8F0"/></w:tblBorders>"#,
            r#"<w:tblCellMar><w:left w:w="100" w:type="dxa"/><w:right w:w="100" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#
        ),
        primary = primary,
        secondary = secondary,
        accent = accent
    );
    xml.push_str("</w:styles>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MarginProfile, Orientation, PageSize};
    use crate::model::{CellValue, TableHeader};
    use chrono::{TimeZone, Utc};
    use std::io::{Cursor, Read};

    fn render(content: &Content, options: ExportOptions) -> (Rendered, String) {
        let created = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
        let report = Report::new("r1", "Bilan T1", created);
        let options =
            options.with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap());
        let rendered = DocxRenderer::new(options).render(&report, content).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(rendered.bytes.clone())).unwrap();
        let mut document = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut document)
            .unwrap();
        (rendered, document)
    }

    #[test]
    fn test_section_geometry() {
        let options = ExportOptions::new()
            .with_page_size(PageSize::A4)
            .with_orientation(Orientation::Landscape)
            .with_margins(MarginProfile::Narrow);
        let (_, document) = render(&Content::default(), options);
        assert!(document.contains(r#"<w:pgSz w:w="16838" w:h="11906" w:orient="landscape"/>"#));
        assert!(document.contains(r#"w:top="720""#));
    }

    #[test]
    fn test_headings_tables_and_lists() {
        let mut table = Table::new(vec![
            TableHeader::new("Région", "region"),
            TableHeader::new("CA", "ca").align(Alignment::Right),
        ]);
        table.push_row([CellValue::from("Nord"), CellValue::from(5)]);
        table.push_row([CellValue::from("Sud"), CellValue::from(7)]);

        let content = Content::new(vec![Section::new("a", "Ventes & marges", 1)
            .with_block(Block::Table(table))
            .with_block(Block::list(ListType::Numbered, ["un", "deux"]))
            .with_block(Block::list(ListType::Numbered, ["trois"]))
            .with_child(Section::new("a1", "Nord", 2))]);
        let (rendered, document) = render(&content, ExportOptions::new());

        assert!(document.contains(r#"<w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">Ventes &amp; marges</w:t>"#));
        assert!(document.contains(r#"<w:pStyle w:val="Heading2"/>"#));
        assert_eq!(document.matches("<w:tblHeader/>").count(), 1);
        assert_eq!(document.matches("<w:tr>").count(), 3);
        assert!(document.contains(r#"<w:numId w:val="2"/>"#));
        assert!(document.contains(r#"<w:numId w:val="3"/>"#));
        assert!(document.contains(r#"TOC \o "1-2""#));
        // cover + toc page breaks
        assert_eq!(rendered.units, 3);
    }

    #[test]
    fn test_data_url_image_is_embedded() {
        let png = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::image(png, Some("logo")))
            .with_block(Block::image("https://example.com/x.png", Some("distant")))]);
        let (rendered, document) = render(&content, ExportOptions::new().with_cover_page(false));
        assert!(document.contains(r#"<a:blip r:embed="rId6"/>"#));
        assert!(document.contains("[Image] distant"));
        assert!(document.contains(r#"<w:hyperlink r:id="rId7">"#));

        let mut archive = zip::ZipArchive::new(Cursor::new(rendered.bytes)).unwrap();
        assert!(archive.by_name("word/media/image1.png").is_ok());
    }
}
