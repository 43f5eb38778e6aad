//! PDF rendering.
//!
//! The renderer lays blocks out on a canvas with a vertical cursor measured
//! in millimetres from the top edge. Before a block is drawn its footprint
//! is estimated; if it does not fit above the bottom margin the canvas
//! breaks to a fresh page. Page footers and table-of-contents page numbers
//! are stamped in a final pass, once the page count is known.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content as PdfContent, Operation};
use lopdf::{dictionary, Document, Object, StringFormat};

use crate::error::Result;
use crate::layout::{mm_to_pt, PageGeometry};
use crate::model::{
    Alignment, Block, CalloutVariant, Chart, Content, DividerStyle, KpiCard, ListItem, ListType,
    Report, Rgb, Section, Table, Theme,
};
use crate::text::{truncate, wrap_lines};

use super::chart::series_color;
use super::visitor::{outline, section_number, walk, ContentVisitor, OutlineEntry};
use super::{DocumentRenderer, ExportOptions, Rendered};

/// Line height of body text.
const LINE_HEIGHT: f32 = 5.0;
/// Height of a table row, header included.
const TABLE_ROW_HEIGHT: f32 = 8.0;
/// Space after most blocks.
const BLOCK_GAP: f32 = 3.0;
const KPI_HEIGHT: f32 = 22.0;
const CHART_HEIGHT: f32 = 60.0;
const IMAGE_HEIGHT: f32 = 50.0;
const TOC_LINE_HEIGHT: f32 = 7.0;
const TABLE_FONT_SIZE: f32 = 9.0;
const FOOTER_FONT_SIZE: f32 = 8.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Convert a report to PDF bytes.
pub fn to_pdf(report: &Report, content: &Content, options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(PdfRenderer::new(options.clone()).render(report, content)?.bytes)
}

/// Where a block (or a fragment of a flowed block) landed.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// 1-based page number
    pub page: usize,
    /// Block type tag, or `section`, `table_header`, `table_row`
    pub kind: &'static str,
    /// Top edge in mm from the top of the page
    pub top: f32,
    /// Bottom edge in mm from the top of the page
    pub bottom: f32,
}

/// Result of the layout pass, without the encoded document.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    /// Total number of pages
    pub page_count: usize,
    /// Page the first section starts on
    pub content_start_page: usize,
    /// Every placed element, in drawing order
    pub placements: Vec<Placement>,
    /// Level 1 and 2 sections with their numbering and start page
    pub toc: Vec<(String, usize)>,
    /// Lowest position content may reach, in mm from the top
    pub content_bottom: f32,
}

/// PDF renderer.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    options: ExportOptions,
}

impl PdfRenderer {
    /// Create a new PDF renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Run the layout pass only.
    pub fn layout(&self, report: &Report, content: &Content) -> PdfLayout {
        let composer = self.compose(report, content);
        PdfLayout {
            page_count: composer.canvas.pages.len(),
            content_start_page: composer.content_start_page,
            placements: composer.canvas.placements,
            toc: composer.section_pages,
            content_bottom: composer.canvas.geometry.content_bottom(),
        }
    }

    fn compose(&self, report: &Report, content: &Content) -> Composer {
        let mut composer = Composer::new(&self.options);

        if self.options.include_cover_page {
            composer.draw_cover(report);
        }
        if self.options.include_table_of_contents && !content.is_empty() {
            composer.draw_toc(content);
        }

        composer.canvas.new_page();
        composer.content_start_page = composer.canvas.page_number();
        walk(content, &mut composer);

        composer.stamp_toc_pages();
        composer.stamp_footers();
        composer
    }

    fn write_document(&self, report: &Report, canvas: Canvas) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font = |base_font: &str| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base_font,
                "Encoding" => "WinAnsiEncoding",
            }
        };
        let regular_id = doc.add_object(font("Helvetica"));
        let bold_id = doc.add_object(font("Helvetica-Bold"));
        let oblique_id = doc.add_object(font("Helvetica-Oblique"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
                "F3" => oblique_id,
            },
        });

        let width = mm_to_pt(canvas.geometry.width);
        let height = mm_to_pt(canvas.geometry.height);
        let mut kids = Vec::with_capacity(canvas.pages.len());

        for operations in canvas.pages {
            let content = PdfContent { operations };
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&content.encode()?)?;
            let stream =
                lopdf::Stream::new(dictionary! {"Filter" => "FlateDecode"}, encoder.finish()?);
            let content_id = doc.add_object(stream);

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let created = self.options.generated_at().format("D:%Y%m%d%H%M%SZ").to_string();
        let info_id = doc.add_object(dictionary! {
            "Title" => pdf_string(&report.title),
            "Author" => pdf_string(&report.author),
            "Subject" => pdf_string(&report.description),
            "Producer" => Object::string_literal("rapport"),
            "CreationDate" => Object::string_literal(created),
        });
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        let composer = self.compose(report, content);
        let pages = composer.canvas.pages.len();
        log::debug!("PDF: {} pages", pages);
        let bytes = self.write_document(report, composer.canvas)?;
        Ok(Rendered::new(bytes, pages))
    }
}

/// Title font size (pt) for a nesting level.
fn title_font_size(level: u8) -> f32 {
    (20.0 - 4.0 * (f32::from(level.max(1)) - 1.0)).max(12.0)
}

/// Vertical footprint (mm) of a title at a nesting level.
fn title_height(level: u8) -> f32 {
    title_font_size(level) / 2.0 + 8.0
}

fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

/// Approximate rendered width of `text` in mm.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * pt_to_mm(size * AVG_GLYPH_WIDTH)
}

/// How many characters fit in `width` mm at `size` pt.
fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / pt_to_mm(size * AVG_GLYPH_WIDTH)).floor() as usize).max(1)
}

/// Encode text for the WinAnsi-encoded standard fonts.
fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{2022}' => 0x95,
            '\u{20AC}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            '\u{00A0}' | '\u{202F}' => b' ',
            c if (c as u32) <= 255 => c as u8,
            _ => b'?',
        })
        .collect()
}

fn pdf_string(s: &str) -> Object {
    Object::String(to_win_ansi(s), StringFormat::Literal)
}

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Oblique,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Oblique => "F3",
        }
    }
}

/// Font, size and fill colour of a run of text.
#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: Font,
    size: f32,
    color: Rgb,
}

impl TextStyle {
    fn new(font: Font, size: f32, color: Rgb) -> Self {
        Self { font, size, color }
    }
}

/// Line stroke settings.
#[derive(Debug, Clone, Copy)]
struct Stroke {
    color: Rgb,
    width: f32,
    dashed: bool,
}

impl Stroke {
    fn solid(color: Rgb, width: f32) -> Self {
        Self {
            color,
            width,
            dashed: false,
        }
    }
}

/// Pages under construction and the layout cursor.
struct Canvas {
    geometry: PageGeometry,
    pages: Vec<Vec<Operation>>,
    cursor: f32,
    placements: Vec<Placement>,
}

impl Canvas {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: Vec::new(),
            cursor: geometry.margins.top,
            placements: Vec::new(),
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = self.geometry.margins.top;
    }

    /// 1-based number of the current page.
    fn page_number(&self) -> usize {
        self.pages.len()
    }

    fn at_page_top(&self) -> bool {
        (self.cursor - self.geometry.margins.top).abs() < 0.01
    }

    fn remaining(&self) -> f32 {
        self.geometry.content_bottom() - self.cursor
    }

    fn left(&self) -> f32 {
        self.geometry.margins.left
    }

    fn right(&self) -> f32 {
        self.geometry.width - self.geometry.margins.right
    }

    fn width(&self) -> f32 {
        self.geometry.content_width()
    }

    /// Break to a new page when `height` does not fit below the cursor.
    /// Returns whether a break happened.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.pages.is_empty() {
            self.new_page();
            return true;
        }
        if height > self.remaining() && !self.at_page_top() {
            self.new_page();
            return true;
        }
        false
    }

    /// Record a placement at the cursor and advance past it. Returns the top.
    fn place(&mut self, kind: &'static str, height: f32) -> f32 {
        let top = self.cursor;
        self.placements.push(Placement {
            page: self.page_number(),
            kind,
            top,
            bottom: top + height,
        });
        self.cursor += height;
        top
    }

    fn gap(&mut self, height: f32) {
        self.cursor = (self.cursor + height).min(self.geometry.content_bottom());
    }

    fn ops(&mut self, page: usize) -> &mut Vec<Operation> {
        while self.pages.len() < page + 1 {
            self.pages.push(Vec::new());
        }
        &mut self.pages[page]
    }

    fn current(&mut self) -> &mut Vec<Operation> {
        let page = self.pages.len().saturating_sub(1);
        self.ops(page)
    }

    fn y(&self, mm_from_top: f32) -> f32 {
        mm_to_pt(self.geometry.height - mm_from_top)
    }

    fn text_on(&mut self, page: usize, x: f32, baseline: f32, style: TextStyle, text: &str) {
        let (px, py) = (mm_to_pt(x), self.y(baseline));
        let [r, g, b] = style.color.to_unit();
        let ops = self.ops(page);
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![style.font.resource().into(), style.size.into()],
        ));
        ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        ops.push(Operation::new("Td", vec![px.into(), py.into()]));
        ops.push(Operation::new("Tj", vec![pdf_string(text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    fn text(&mut self, x: f32, baseline: f32, style: TextStyle, text: &str) {
        let page = self.pages.len().saturating_sub(1);
        self.text_on(page, x, baseline, style, text);
    }

    fn fill_rect(&mut self, x: f32, top: f32, w: f32, h: f32, color: Rgb) {
        let rect = vec![
            mm_to_pt(x).into(),
            self.y(top + h).into(),
            mm_to_pt(w).into(),
            mm_to_pt(h).into(),
        ];
        let [r, g, b] = color.to_unit();
        let ops = self.current();
        ops.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        ops.push(Operation::new("re", rect));
        ops.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, top: f32, w: f32, h: f32, color: Rgb) {
        let rect = vec![
            mm_to_pt(x).into(),
            self.y(top + h).into(),
            mm_to_pt(w).into(),
            mm_to_pt(h).into(),
        ];
        let [r, g, b] = color.to_unit();
        let ops = self.current();
        ops.push(Operation::new("w", vec![0.75.into()]));
        ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        ops.push(Operation::new("re", rect));
        ops.push(Operation::new("S", vec![]));
    }

    fn hline_on(&mut self, page: usize, x1: f32, x2: f32, y: f32, stroke: Stroke) {
        let (px1, px2, py) = (mm_to_pt(x1), mm_to_pt(x2), self.y(y));
        let [r, g, b] = stroke.color.to_unit();
        let ops = self.ops(page);
        ops.push(Operation::new("w", vec![stroke.width.into()]));
        ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        if stroke.dashed {
            ops.push(Operation::new(
                "d",
                vec![vec![Object::Integer(4), Object::Integer(3)].into(), 0.into()],
            ));
        }
        ops.push(Operation::new("m", vec![px1.into(), py.into()]));
        ops.push(Operation::new("l", vec![px2.into(), py.into()]));
        ops.push(Operation::new("S", vec![]));
        if stroke.dashed {
            ops.push(Operation::new("d", vec![vec![].into(), 0.into()]));
        }
    }

    fn hline(&mut self, x1: f32, x2: f32, y: f32, stroke: Stroke) {
        let page = self.pages.len().saturating_sub(1);
        self.hline_on(page, x1, x2, y, stroke);
    }
}

/// Where a table-of-contents page number goes.
struct TocSlot {
    page: usize,
    baseline: f32,
}

struct Composer {
    theme: Theme,
    generated_on: String,
    canvas: Canvas,
    content_start_page: usize,
    toc_slots: Vec<TocSlot>,
    section_pages: Vec<(String, usize)>,
}

impl Composer {
    fn new(options: &ExportOptions) -> Self {
        Self {
            theme: options.theme(),
            generated_on: options.generated_at().format("%d/%m/%Y").to_string(),
            canvas: Canvas::new(options.page_geometry()),
            content_start_page: 1,
            toc_slots: Vec::new(),
            section_pages: Vec::new(),
        }
    }

    fn body_size(&self) -> f32 {
        self.theme.base_font_size
    }

    fn body(&self, font: Font, color: Rgb) -> TextStyle {
        TextStyle::new(font, self.body_size(), color)
    }

    fn draw_cover(&mut self, report: &Report) {
        self.canvas.new_page();
        let width = self.canvas.geometry.width;
        let left = self.canvas.left();
        let text_width = self.canvas.width();
        let primary = self.theme.primary;

        self.canvas.fill_rect(0.0, 0.0, width, 90.0, primary);
        self.canvas.fill_rect(0.0, 90.0, width, 2.5, self.theme.accent);

        let title = self
            .theme
            .cover_title
            .clone()
            .unwrap_or_else(|| report.title.clone());
        let title_style = TextStyle::new(Font::Bold, 26.0, Rgb::WHITE);
        let mut baseline = 45.0;
        for line in wrap_lines(&title, chars_per_line(text_width, 26.0)).iter().take(3) {
            self.canvas.text(left, baseline, title_style, line);
            baseline += 11.0;
        }

        let subtitle = self
            .theme
            .cover_subtitle
            .clone()
            .or_else(|| (!report.period_label.is_empty()).then(|| report.period_label.clone()));
        if let Some(subtitle) = subtitle {
            let line = truncate(&subtitle, chars_per_line(text_width, 14.0));
            let style = TextStyle::new(Font::Regular, 14.0, Rgb::WHITE);
            self.canvas.text(left, baseline.min(84.0), style, &line);
        }

        let mut y = 110.0;
        if !report.description.is_empty() {
            let style = TextStyle::new(Font::Oblique, 12.0, Rgb::TEXT);
            for line in wrap_lines(&report.description, chars_per_line(text_width, 12.0))
                .iter()
                .take(6)
            {
                self.canvas.text(left, y, style, line);
                y += 6.0;
            }
            y += 6.0;
        }

        let label_style = TextStyle::new(Font::Bold, 11.0, self.theme.secondary);
        let value_style = TextStyle::new(Font::Regular, 11.0, Rgb::TEXT);
        for (label, value) in report.summary_rows().into_iter().skip(1) {
            if label == "Description" {
                continue;
            }
            self.canvas.text(left, y, label_style, label);
            self.canvas.text(left + 40.0, y, value_style, &value);
            y += 7.0;
        }

        let bottom = self.canvas.geometry.content_bottom();
        let generated = format!("Généré le {}", self.generated_on);
        let style = TextStyle::new(Font::Regular, 10.0, Rgb::MUTED);
        self.canvas.text(left, bottom, style, &generated);
        self.canvas.placements.push(Placement {
            page: self.canvas.page_number(),
            kind: "cover",
            top: 0.0,
            bottom,
        });
    }

    fn draw_toc(&mut self, content: &Content) {
        let entries = outline(content, 2);

        self.canvas.new_page();
        let left = self.canvas.left();
        let height = title_height(1);
        let top = self.canvas.place("toc", height);
        let heading = TextStyle::new(Font::Bold, 20.0, self.theme.primary);
        self.canvas
            .text(left, top + pt_to_mm(20.0), heading, "Sommaire");

        for OutlineEntry {
            number,
            title,
            depth,
        } in entries
        {
            self.canvas.ensure_space(TOC_LINE_HEIGHT);
            let top = self.canvas.place("toc", TOC_LINE_HEIGHT);
            let baseline = top + 5.0;
            let indent = if depth > 1 { 8.0 } else { 0.0 };
            let style = if depth > 1 {
                TextStyle::new(Font::Regular, 10.0, Rgb::TEXT)
            } else {
                TextStyle::new(Font::Bold, 11.0, Rgb::TEXT)
            };
            let max = chars_per_line(self.canvas.width() - indent - 30.0, style.size);
            let label = truncate(&format!("{}  {}", number, title), max);
            self.canvas.text(left + indent, baseline, style, &label);
            self.toc_slots.push(TocSlot {
                page: self.canvas.page_number() - 1,
                baseline,
            });
        }
    }

    fn stamp_toc_pages(&mut self) {
        let right = self.canvas.right();
        let style = TextStyle::new(Font::Regular, 10.0, Rgb::TEXT);
        let slots = std::mem::take(&mut self.toc_slots);
        for (slot, (_, page)) in slots.iter().zip(self.section_pages.clone()) {
            let label = page.to_string();
            let x = right - text_width(&label, 10.0);
            self.canvas.text_on(slot.page, x, slot.baseline, style, &label);
        }
    }

    fn stamp_footers(&mut self) {
        let total = self.canvas.pages.len();
        let left = self.canvas.left();
        let right = self.canvas.right();
        let bottom = self.canvas.geometry.height - self.canvas.geometry.margins.bottom / 2.0;
        let footer = self.theme.footer_text.clone();
        let number_style = TextStyle::new(Font::Regular, FOOTER_FONT_SIZE, Rgb::MUTED);
        let footer_style = TextStyle::new(Font::Oblique, FOOTER_FONT_SIZE, Rgb::MUTED);
        let rule = Stroke::solid(Rgb::ZEBRA, 0.5);

        for page in 0..total {
            let label = format!("Page {} / {}", page + 1, total);
            let x = right - text_width(&label, FOOTER_FONT_SIZE);
            self.canvas.hline_on(page, left, right, bottom - 4.5, rule);
            self.canvas.text_on(page, x, bottom, number_style, &label);
            if let Some(ref footer) = footer {
                let max = chars_per_line(self.canvas.width() * 0.6, FOOTER_FONT_SIZE);
                self.canvas
                    .text_on(page, left, bottom, footer_style, &truncate(footer, max));
            }
        }
    }

    fn draw_title(&mut self, kind: &'static str, text: &str, level: u8, reserve: f32) {
        let height = title_height(level);
        let size = title_font_size(level);
        // Keep a title with at least the start of what follows it.
        self.canvas.ensure_space(height + reserve);
        let top = self.canvas.place(kind, height);
        let left = self.canvas.left();
        let max = chars_per_line(self.canvas.width(), size);
        let style = TextStyle::new(Font::Bold, size, self.theme.primary);
        self.canvas
            .text(left, top + pt_to_mm(size) + 1.5, style, &truncate(text, max));
        if kind == "section" && level == 1 {
            let right = self.canvas.right();
            let rule = Stroke::solid(self.theme.accent, 0.8);
            self.canvas.hline(left, right, top + height - 2.0, rule);
        }
    }

    /// Draw wrapped lines, flowing across pages when the block is taller
    /// than a page.
    fn draw_lines(&mut self, kind: &'static str, lines: &[String], style: TextStyle) {
        let left = self.canvas.left();
        let height = lines.len() as f32 * LINE_HEIGHT;

        if height <= self.canvas.geometry.content_height() {
            self.canvas.ensure_space(height + 5.0);
            let top = self.canvas.place(kind, height);
            for (i, line) in lines.iter().enumerate() {
                let baseline = top + (i as f32 + 1.0) * LINE_HEIGHT - 1.2;
                self.canvas.text(left, baseline, style, line);
            }
        } else {
            for line in lines {
                self.canvas.ensure_space(LINE_HEIGHT);
                let top = self.canvas.place(kind, LINE_HEIGHT);
                self.canvas.text(left, top + LINE_HEIGHT - 1.2, style, line);
            }
        }
        self.canvas.gap(5.0);
    }

    fn draw_list(&mut self, list_type: ListType, items: &[ListItem]) {
        let style = self.body(Font::Regular, Rgb::TEXT);
        let left = self.canvas.left();
        let max = chars_per_line(self.canvas.width() - 8.0, style.size);
        let page_height = self.canvas.geometry.content_height();

        for (i, item) in items.iter().enumerate() {
            let marker = match list_type {
                ListType::Bulleted => "\u{2022}".to_string(),
                ListType::Numbered => format!("{}.", i + 1),
            };
            let lines = wrap_lines(&item.content, max);
            let lines = if lines.is_empty() { vec![String::new()] } else { lines };
            let height = lines.len() as f32 * LINE_HEIGHT;

            if height <= page_height {
                self.canvas.ensure_space(height);
                let top = self.canvas.place("list", height);
                self.canvas
                    .text(left + 2.0, top + LINE_HEIGHT - 1.2, style, &marker);
                for (n, line) in lines.iter().enumerate() {
                    let baseline = top + (n as f32 + 1.0) * LINE_HEIGHT - 1.2;
                    self.canvas.text(left + 8.0, baseline, style, line);
                }
            } else {
                for (n, line) in lines.iter().enumerate() {
                    self.canvas.ensure_space(LINE_HEIGHT);
                    let baseline = self.canvas.place("list", LINE_HEIGHT) + LINE_HEIGHT - 1.2;
                    if n == 0 {
                        self.canvas.text(left + 2.0, baseline, style, &marker);
                    }
                    self.canvas.text(left + 8.0, baseline, style, line);
                }
            }
        }
        self.canvas.gap(BLOCK_GAP);
    }

    /// How many lines of a boxed block fit on the current page below a
    /// header band of `header` mm, breaking first when not even the opening
    /// lines fit. Always at least one.
    fn fit_boxed_lines(&mut self, header: f32, remaining_lines: usize) -> usize {
        let whole = header + remaining_lines as f32 * LINE_HEIGHT + 2.0;
        let opening = header + 3.0 * LINE_HEIGHT + 2.0;
        self.canvas.ensure_space(whole.min(opening));
        let room = (self.canvas.remaining() - header - 2.0) / LINE_HEIGHT;
        (room.floor().max(1.0) as usize).min(remaining_lines)
    }

    fn draw_callout(&mut self, variant: CalloutVariant, title: Option<&str>, content: &str) {
        let style = self.body(Font::Regular, Rgb::TEXT);
        let max = chars_per_line(self.canvas.width() - 10.0, style.size);
        let lines = wrap_lines(content, max);
        let color = variant.color();
        let title_style = self.body(Font::Bold, color);

        let mut rest: &[String] = &lines;
        let mut first = true;
        loop {
            // The title band only opens the first segment.
            let header = if first { 10.0 } else { 2.0 };
            let take = self.fit_boxed_lines(header, rest.len());
            let height = header + take as f32 * LINE_HEIGHT + 2.0;
            let top = self.canvas.place("callout", height);
            let left = self.canvas.left();
            let width = self.canvas.width();

            self.canvas.fill_rect(left, top, width, height, color.lighten(0.9));
            self.canvas.fill_rect(left, top, 1.5, height, color);
            if first {
                let title = title.unwrap_or(variant.label());
                self.canvas.text(left + 6.0, top + 6.5, title_style, title);
            }
            for (i, line) in rest[..take].iter().enumerate() {
                let baseline = top + header + (i as f32 + 1.0) * LINE_HEIGHT - 1.2;
                self.canvas.text(left + 6.0, baseline, style, line);
            }

            rest = &rest[take..];
            first = false;
            if rest.is_empty() {
                break;
            }
            self.canvas.new_page();
        }
        self.canvas.gap(BLOCK_GAP + 1.0);
    }

    fn draw_quote(&mut self, content: &str, author: Option<&str>) {
        let size = self.body_size();
        let max = chars_per_line(self.canvas.width() - 10.0, size);
        let mut lines = wrap_lines(content, max);
        let attribution = author.map(|author| {
            lines.push(format!("\u{2014} {}", author));
            lines.len() - 1
        });
        let quoted = self.body(Font::Oblique, Rgb::TEXT);
        let signed = self.body(Font::Regular, Rgb::MUTED);

        let mut start = 0;
        loop {
            let take = self.fit_boxed_lines(0.0, lines.len() - start);
            let height = take as f32 * LINE_HEIGHT + 2.0;
            let top = self.canvas.place("quote", height);
            let left = self.canvas.left();
            self.canvas.fill_rect(left, top, 1.0, height, self.theme.accent);
            for (i, line) in lines[start..start + take].iter().enumerate() {
                let baseline = top + (i as f32 + 1.0) * LINE_HEIGHT - 0.5;
                let style = if attribution == Some(start + i) { signed } else { quoted };
                self.canvas.text(left + 6.0, baseline, style, line);
            }

            start += take;
            if start >= lines.len() {
                break;
            }
            self.canvas.new_page();
        }
        self.canvas.gap(BLOCK_GAP + 2.0);
    }

    fn draw_divider(&mut self, style: DividerStyle) {
        self.canvas.ensure_space(6.0);
        let top = self.canvas.place("divider", 6.0);
        let (left, right) = (self.canvas.left(), self.canvas.right());
        let stroke = Stroke {
            color: self.theme.secondary.lighten(0.5),
            width: 0.75,
            dashed: style == DividerStyle::Dashed,
        };
        self.canvas.hline(left, right, top + 3.0, stroke);
    }

    fn draw_table(&mut self, table: &Table) {
        if table.headers.is_empty() {
            log::debug!("Skipping table without headers");
            return;
        }
        let column_width = self.canvas.width() / table.headers.len() as f32;
        let max = chars_per_line(column_width - 4.0, TABLE_FONT_SIZE);
        let style = TextStyle::new(Font::Regular, TABLE_FONT_SIZE, Rgb::TEXT);

        self.canvas.ensure_space(TABLE_ROW_HEIGHT * 2.0);
        self.draw_table_header(table, column_width, max);

        for (i, row) in table.rows.iter().enumerate() {
            if self.canvas.ensure_space(TABLE_ROW_HEIGHT) {
                self.draw_table_header(table, column_width, max);
            }
            let top = self.canvas.place("table_row", TABLE_ROW_HEIGHT);
            let left = self.canvas.left();
            if i % 2 == 1 {
                let width = self.canvas.width();
                self.canvas
                    .fill_rect(left, top, width, TABLE_ROW_HEIGHT, Rgb::ZEBRA);
            }
            for (c, header) in table.headers.iter().enumerate() {
                let text = truncate(&table.cell_text(row, header), max);
                let column_left = left + c as f32 * column_width;
                let x = cell_x(column_left, column_width, &text, header.alignment());
                self.canvas.text(x, top + 5.5, style, &text);
            }
        }
        self.canvas.gap(BLOCK_GAP + 2.0);
    }

    fn draw_table_header(&mut self, table: &Table, column_width: f32, max: usize) {
        let top = self.canvas.place("table_header", TABLE_ROW_HEIGHT);
        let left = self.canvas.left();
        let width = self.canvas.width();
        let style = TextStyle::new(Font::Bold, TABLE_FONT_SIZE, Rgb::WHITE);
        self.canvas
            .fill_rect(left, top, width, TABLE_ROW_HEIGHT, self.theme.primary);
        for (c, header) in table.headers.iter().enumerate() {
            let text = truncate(&header.label, max);
            let column_left = left + c as f32 * column_width;
            let x = cell_x(column_left, column_width, &text, header.alignment());
            self.canvas.text(x, top + 5.5, style, &text);
        }
    }

    fn draw_kpi(&mut self, kpi: &KpiCard) {
        self.canvas.ensure_space(KPI_HEIGHT + BLOCK_GAP);
        let top = self.canvas.place("kpi_card", KPI_HEIGHT);
        let left = self.canvas.left();
        let width = self.canvas.width().min(90.0);
        let trend = kpi.trend();

        self.canvas.fill_rect(left, top, width, KPI_HEIGHT, Rgb::ZEBRA);
        self.canvas.fill_rect(left, top, 1.5, KPI_HEIGHT, trend.color());

        let label = truncate(&kpi.label, chars_per_line(width - 8.0, 9.0));
        let label_style = TextStyle::new(Font::Regular, 9.0, Rgb::MUTED);
        self.canvas.text(left + 5.0, top + 6.0, label_style, &label);

        let value = truncate(&kpi.display_value(), chars_per_line(width - 8.0, 16.0));
        let value_style = TextStyle::new(Font::Bold, 16.0, Rgb::TEXT);
        self.canvas.text(left + 5.0, top + 14.0, value_style, &value);

        if let Some(change) = kpi.formatted_change() {
            let change_style = TextStyle::new(Font::Bold, 9.0, trend.color());
            self.canvas.text(left + 5.0, top + 19.5, change_style, &change);
        }
        self.canvas.gap(BLOCK_GAP);
    }

    fn draw_chart(&mut self, chart: &Chart) {
        self.canvas.ensure_space(CHART_HEIGHT + BLOCK_GAP);
        let top = self.canvas.place("chart", CHART_HEIGHT);
        let left = self.canvas.left();
        let width = self.canvas.width();

        self.canvas
            .stroke_rect(left, top, width, CHART_HEIGHT, self.theme.secondary.lighten(0.4));
        let title = truncate(&chart.display_title(), chars_per_line(width - 10.0, 12.0));
        let title_style = TextStyle::new(Font::Bold, 12.0, self.theme.primary);
        self.canvas.text(left + 5.0, top + 9.0, title_style, &title);
        let summary = format!(
            "Graphique {} \u{2022} {} s\u{e9}rie(s), {} point(s)",
            chart.chart_type,
            chart.data.datasets.len(),
            chart.data.labels.len()
        );
        let summary_style = TextStyle::new(Font::Oblique, 9.0, Rgb::MUTED);
        self.canvas.text(left + 5.0, top + 16.0, summary_style, &summary);

        let legend_style = TextStyle::new(Font::Regular, 9.0, Rgb::TEXT);
        let mut y = top + 25.0;
        for (i, dataset) in chart.data.datasets.iter().enumerate() {
            if y > top + CHART_HEIGHT - 5.0 {
                break;
            }
            let color = series_color(&self.theme, dataset, i);
            self.canvas.fill_rect(left + 5.0, y - 3.0, 4.0, 4.0, color);
            let label = truncate(&dataset.label, chars_per_line(width - 20.0, 9.0));
            self.canvas.text(left + 12.0, y, legend_style, &label);
            y += 6.0;
        }
        self.canvas.gap(BLOCK_GAP + 2.0);
    }

    fn draw_image(&mut self, src: &str, alt: Option<&str>, caption: Option<&str>) {
        let caption_height = if caption.is_some() { LINE_HEIGHT + 1.0 } else { 0.0 };
        let height = IMAGE_HEIGHT + caption_height;
        self.canvas.ensure_space(height + BLOCK_GAP);
        let top = self.canvas.place("image", height);
        let left = self.canvas.left();
        let width = self.canvas.width();
        let middle = top + IMAGE_HEIGHT / 2.0;

        self.canvas
            .stroke_rect(left, top, width, IMAGE_HEIGHT, self.theme.secondary.lighten(0.4));
        let label = match alt {
            Some(alt) if !alt.is_empty() => format!("[Image] {}", alt),
            _ => "[Image]".to_string(),
        };
        let label = truncate(&label, chars_per_line(width - 10.0, 10.0));
        let x = left + (width - text_width(&label, 10.0)) / 2.0;
        let label_style = TextStyle::new(Font::Oblique, 10.0, Rgb::MUTED);
        self.canvas.text(x, middle, label_style, &label);
        if !src.starts_with("data:") {
            let source = truncate(src, chars_per_line(width - 10.0, 7.0));
            let x = left + (width - text_width(&source, 7.0)) / 2.0;
            let source_style = TextStyle::new(Font::Regular, 7.0, Rgb::MUTED);
            self.canvas.text(x, middle + 5.0, source_style, &source);
        }
        if let Some(caption) = caption {
            let caption = truncate(caption, chars_per_line(width, 9.0));
            let caption_style = TextStyle::new(Font::Oblique, 9.0, Rgb::MUTED);
            self.canvas
                .text(left, top + IMAGE_HEIGHT + LINE_HEIGHT, caption_style, &caption);
        }
        self.canvas.gap(BLOCK_GAP + 2.0);
    }
}

impl ContentVisitor for Composer {
    fn enter_section(&mut self, section: &Section, path: &[usize]) {
        self.draw_title("section", &section.title, section.depth(), LINE_HEIGHT * 2.0);
        if path.len() <= 2 {
            self.section_pages
                .push((section_number(path), self.canvas.page_number()));
        }
    }

    fn visit_block(&mut self, _section: &Section, block: &Block) {
        let wrap = chars_per_line(self.canvas.width(), self.body_size());
        match block {
            Block::Paragraph { content } => {
                let lines = wrap_lines(content, wrap);
                if lines.is_empty() {
                    return;
                }
                let style = self.body(Font::Regular, Rgb::TEXT);
                self.draw_lines("paragraph", &lines, style);
            }
            Block::Heading { level, content } => {
                self.draw_title("heading", content, *level, LINE_HEIGHT);
            }
            Block::List { list_type, items } => self.draw_list(*list_type, items),
            Block::Table(table) => self.draw_table(table),
            Block::KpiCard(kpi) => self.draw_kpi(kpi),
            Block::Callout {
                variant,
                title,
                content,
            } => self.draw_callout(*variant, title.as_deref(), content),
            Block::Divider { style } => self.draw_divider(*style),
            Block::Pagebreak => {
                if !self.canvas.at_page_top() {
                    self.canvas.new_page();
                }
            }
            Block::Quote { content, author } => self.draw_quote(content, author.as_deref()),
            Block::Chart(chart) => self.draw_chart(chart),
            Block::Image { src, alt, caption } => {
                self.draw_image(src, alt.as_deref(), caption.as_deref())
            }
        }
    }
}

fn cell_x(column_left: f32, column_width: f32, text: &str, alignment: Alignment) -> f32 {
    match alignment {
        Alignment::Left => column_left + 2.0,
        Alignment::Center => column_left + (column_width - text_width(text, TABLE_FONT_SIZE)) / 2.0,
        Alignment::Right => column_left + column_width - 2.0 - text_width(text, TABLE_FONT_SIZE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MarginProfile, Orientation, PageSize};
    use crate::model::{CellValue, TableHeader};
    use chrono::{TimeZone, Utc};

    fn report() -> Report {
        Report::new("r1", "Bilan T1", Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap())
    }

    fn options() -> ExportOptions {
        ExportOptions::new().with_generated_at(Utc.with_ymd_and_hms(2024, 4, 5, 0, 0, 0).unwrap())
    }

    fn bare() -> PdfRenderer {
        PdfRenderer::new(options().with_cover_page(false).with_table_of_contents(false))
    }

    fn assert_within_margins(layout: &PdfLayout) {
        for placement in &layout.placements {
            assert!(
                placement.bottom <= layout.content_bottom + 0.01,
                "{:?} crosses the bottom margin",
                placement
            );
        }
    }

    fn extracted_text(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages).unwrap()
    }

    fn numbered_words(count: usize) -> String {
        (0..count).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn long_table(rows: usize) -> Table {
        let mut table = Table::new(vec![
            TableHeader::new("Mois", "month"),
            TableHeader::new("Montant", "amount").align(Alignment::Right),
        ]);
        for i in 0..rows {
            table.push_row([CellValue::from(format!("M{}", i)), CellValue::from(i as i64)]);
        }
        table
    }

    #[test]
    fn test_title_metrics() {
        assert_eq!(title_font_size(1), 20.0);
        assert_eq!(title_font_size(2), 16.0);
        assert_eq!(title_font_size(3), 12.0);
        assert_eq!(title_font_size(6), 12.0);
        assert_eq!(title_height(1), 18.0);
        assert_eq!(title_height(4), 14.0);
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(to_win_ansi("é€"), vec![0xE9, 0x80]);
        assert_eq!(to_win_ansi("\u{2022}\u{2014}"), vec![0x95, 0x97]);
        assert_eq!(to_win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn test_empty_content_has_one_page() {
        let layout = bare().layout(&report(), &Content::default());
        assert_eq!(layout.page_count, 1);
        assert_eq!(layout.content_start_page, 1);
    }

    #[test]
    fn test_content_starts_on_fresh_page() {
        let content = Content::new(vec![
            Section::new("a", "Synthèse", 1).with_child(Section::new("a1", "Ventes", 2)),
            Section::new("b", "Perspectives", 1),
        ]);
        let layout = PdfRenderer::new(options()).layout(&report(), &content);
        assert_eq!(layout.content_start_page, 3);
        assert_eq!(
            layout.toc,
            vec![("1".to_string(), 3), ("1.1".to_string(), 3), ("2".to_string(), 3)]
        );
    }

    #[test]
    fn test_long_table_paginates_without_crossing() {
        let content = Content::new(vec![
            Section::new("a", "Détail", 1).with_block(Block::Table(long_table(80)))
        ]);
        let layout = bare().layout(&report(), &content);

        assert!(layout.page_count >= 3);
        assert_within_margins(&layout);
        let rows = layout.placements.iter().filter(|p| p.kind == "table_row").count();
        assert_eq!(rows, 80);

        // Every page holding rows starts with a repeated header.
        for page in 1..=layout.page_count {
            let first = layout
                .placements
                .iter()
                .find(|p| p.page == page && p.kind.starts_with("table"));
            if let Some(first) = first {
                assert_eq!(first.kind, "table_header");
            }
        }
    }

    #[test]
    fn test_pagebreak_forces_new_page() {
        let content = Content::new(vec![Section::new("a", "A", 1)
            .with_block(Block::paragraph("avant"))
            .with_block(Block::Pagebreak)
            .with_block(Block::paragraph("après"))]);
        let layout = bare().layout(&report(), &content);
        let pages: Vec<usize> = layout
            .placements
            .iter()
            .filter(|p| p.kind == "paragraph")
            .map(|p| p.page)
            .collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_landscape_letter_renders() {
        let options = options()
            .with_page_size(PageSize::Letter)
            .with_orientation(Orientation::Landscape)
            .with_margins(MarginProfile::Wide);
        let content =
            Content::new(vec![Section::new("a", "A", 1).with_block(Block::paragraph("x"))]);
        let bytes = to_pdf(&report(), &content, &options).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_long_list_item_flows_across_pages() {
        let content = Content::new(vec![Section::new("a", "Liste", 1).with_block(Block::list(
            ListType::Bulleted,
            ["mot ".repeat(3000)],
        ))]);
        let layout = bare().layout(&report(), &content);

        assert!(layout.page_count >= 2);
        assert_within_margins(&layout);
        let pages: Vec<usize> = layout
            .placements
            .iter()
            .filter(|p| p.kind == "list")
            .map(|p| p.page)
            .collect();
        assert!(pages.contains(&1) && pages.contains(&layout.page_count));
    }

    #[test]
    fn test_long_callout_keeps_every_line() {
        let content = Content::new(vec![Section::new("a", "Alerte", 1).with_block(
            Block::callout(CalloutVariant::Warning, numbered_words(3000)),
        )]);

        let layout = bare().layout(&report(), &content);
        assert_within_margins(&layout);
        let segments = layout.placements.iter().filter(|p| p.kind == "callout").count();
        assert_eq!(segments, layout.page_count);

        let text = extracted_text(&to_pdf(&report(), &content, &bare().options).unwrap());
        assert!(text.contains("w10"));
        assert!(text.contains("w1500"));
        assert!(text.contains("w2999"));
        assert_eq!(text.matches("Attention").count(), 1);
    }

    #[test]
    fn test_long_quote_keeps_text_and_author() {
        let content = Content::new(vec![Section::new("a", "Citation", 1).with_block(
            Block::quote(numbered_words(2000), Some("Direction")),
        )]);

        let layout = bare().layout(&report(), &content);
        assert!(layout.page_count >= 2);
        assert_within_margins(&layout);

        let text = extracted_text(&to_pdf(&report(), &content, &bare().options).unwrap());
        assert!(text.contains("w1999"));
        assert!(text.contains("Direction"));
    }
}
