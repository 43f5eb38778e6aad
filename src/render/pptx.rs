//! PowerPoint (PPTX) rendering.
//!
//! Every section opens a slide. Blocks are stacked below the slide title
//! with fixed heights from [`SlideLayout`]; when the block cap or the
//! content bottom is reached, or a page break is met, the section continues
//! on a new slide carrying the same title. Charts and images are embedded
//! natively when possible and degrade to a placeholder text otherwise.

use std::fmt::Write as _;

use crate::error::Result;
use crate::layout::in_to_emu;
use crate::model::{
    Alignment, Block, CalloutVariant, Chart, Content, DividerStyle, KpiCard, ListItem, ListType,
    Report, Rgb, Section, Table, Theme,
};
use crate::text::{escape_xml, truncate};

use super::chart::{embed_chart, embed_image, Embed, ImagePart};
use super::options::SlideLayout;
use super::package::{
    theme_xml, Package, Relationships, CT_CHART, CT_THEME, REL_CHART, REL_IMAGE, REL_THEME,
    XML_DECLARATION,
};
use super::visitor::{outline, walk, ContentVisitor};
use super::{DocumentRenderer, ExportOptions, Rendered};

const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_SLIDE_LAYOUT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
const CT_SLIDE_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
const CT_PRES_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml";
const CT_VIEW_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml";
const CT_TABLE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const NS_SLIDE: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
    r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
    r#" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);

const EMPTY_GROUP: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

/// Vertical space left between stacked blocks, in inches.
const BLOCK_SPACING: f64 = 0.1;
const TITLE_TOP: f64 = 0.3;
const TITLE_HEIGHT: f64 = 0.8;

/// Convert a report to PPTX bytes.
pub fn to_pptx(report: &Report, content: &Content, options: &ExportOptions) -> Result<Vec<u8>> {
    Ok(PptxRenderer::new(options.clone()).render(report, content)?.bytes)
}

/// Layout summary of one slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidePlan {
    /// "cover", "contents" or "section"
    pub kind: &'static str,
    /// Title stamped on the slide
    pub title: String,
    /// Whether this slide continues the previous section slide
    pub continuation: bool,
    /// Kinds of the blocks placed on the slide, in order
    pub blocks: Vec<&'static str>,
    /// Cursor position after the last block, in inches from the top
    pub cursor: f64,
}

/// PowerPoint deck renderer.
#[derive(Debug, Clone, Default)]
pub struct PptxRenderer {
    options: ExportOptions,
}

impl PptxRenderer {
    /// Create a new PPTX renderer.
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Lay the deck out without packaging it.
    pub fn plan(&self, report: &Report, content: &Content) -> Vec<SlidePlan> {
        self.build(report, content)
            .slides
            .into_iter()
            .map(|slide| slide.plan)
            .collect()
    }

    fn build(&self, report: &Report, content: &Content) -> Deck {
        let theme = self.options.theme();
        let layout = &self.options.slide_layout;
        let mut builder = DeckBuilder::new(&theme, layout);

        if self.options.include_cover_page {
            let generated_on = self.options.generated_at().format("%d/%m/%Y").to_string();
            builder.cover(report, &generated_on);
        }
        if self.options.include_table_of_contents && !content.is_empty() {
            builder.contents(content);
        }
        walk(content, &mut builder);
        if builder.slides.is_empty() {
            builder.open("section", &report.title, false);
        }

        Deck {
            slides: builder.slides,
            charts: builder.charts,
            media: builder.media,
        }
    }
}

impl DocumentRenderer for PptxRenderer {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn render(&self, report: &Report, content: &Content) -> Result<Rendered> {
        let deck = self.build(report, content);
        let theme = self.options.theme();
        let layout = &self.options.slide_layout;

        let mut package = Package::new();
        package.add_package_metadata(
            "ppt/presentation.xml",
            report,
            &self.options.generated_at(),
            "rapport",
        )?;

        let mut rels = Relationships::new();
        rels.add(&format!("{}/slideMaster", REL_BASE), "slideMasters/slideMaster1.xml");
        rels.add(REL_THEME, "theme/theme1.xml");
        rels.add(&format!("{}/presProps", REL_BASE), "presProps.xml");
        rels.add(&format!("{}/viewProps", REL_BASE), "viewProps.xml");
        rels.add(&format!("{}/tableStyles", REL_BASE), "tableStyles.xml");

        let mut slide_ids = String::new();
        for (i, slide) in deck.slides.iter().enumerate() {
            let n = i + 1;
            let id = rels.add(&format!("{}/slide", REL_BASE), &format!("slides/slide{}.xml", n));
            let _ = write!(slide_ids, r#"<p:sldId id="{}" r:id="{}"/>"#, 255 + n, id);
            package.add_part(&format!("ppt/slides/slide{}.xml", n), CT_SLIDE, slide.to_xml())?;
            package.add_raw(
                &format!("ppt/slides/_rels/slide{}.xml.rels", n),
                slide.rels.to_xml(),
            )?;
        }

        let presentation = format!(
            concat!(
                "{decl}<p:presentation {ns} saveSubsetFonts=\"1\">",
                r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
                "<p:sldIdLst>{ids}</p:sldIdLst>",
                r#"<p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/>"#,
                "</p:presentation>"
            ),
            decl = XML_DECLARATION,
            ns = NS_SLIDE,
            ids = slide_ids,
            cx = in_to_emu(layout.slide_width),
            cy = in_to_emu(layout.slide_height)
        );
        package.add_part("ppt/presentation.xml", CT_PRESENTATION, presentation)?;
        package.add_raw("ppt/_rels/presentation.xml.rels", rels.to_xml())?;

        let mut master_rels = Relationships::new();
        master_rels.add(&format!("{}/slideLayout", REL_BASE), "../slideLayouts/slideLayout1.xml");
        master_rels.add(REL_THEME, "../theme/theme1.xml");
        package.add_part("ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER, slide_master_xml())?;
        package.add_raw(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            master_rels.to_xml(),
        )?;

        let mut layout_rels = Relationships::new();
        layout_rels.add(&format!("{}/slideMaster", REL_BASE), "../slideMasters/slideMaster1.xml");
        package.add_part("ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT, slide_layout_xml())?;
        package.add_raw(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            layout_rels.to_xml(),
        )?;

        package.add_part(
            "ppt/theme/theme1.xml",
            CT_THEME,
            theme_xml(
                &theme.primary.to_hex(),
                &theme.secondary.to_hex(),
                &theme.accent.to_hex(),
            ),
        )?;
        package.add_part(
            "ppt/presProps.xml",
            CT_PRES_PROPS,
            format!("{}<p:presentationPr {}/>", XML_DECLARATION, NS_SLIDE),
        )?;
        package.add_part(
            "ppt/viewProps.xml",
            CT_VIEW_PROPS,
            format!(
                r#"{}<p:viewPr {}><p:gridSpacing cx="72008" cy="72008"/></p:viewPr>"#,
                XML_DECLARATION, NS_SLIDE
            ),
        )?;
        package.add_part(
            "ppt/tableStyles.xml",
            CT_TABLE_STYLES,
            format!(
                r#"{}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
                XML_DECLARATION
            ),
        )?;

        for (i, chart) in deck.charts.iter().enumerate() {
            package.add_part(&format!("ppt/charts/chart{}.xml", i + 1), CT_CHART, chart)?;
        }
        for (name, part) in &deck.media {
            let content_type = if part.extension == "png" {
                "image/png"
            } else {
                "image/jpeg"
            };
            package.add_default(part.extension, content_type);
            package.add_raw(&format!("ppt/media/{}", name), &part.bytes)?;
        }

        log::debug!(
            "PPTX: {} slides, {} native charts, {} images",
            deck.slides.len(),
            deck.charts.len(),
            deck.media.len()
        );
        Ok(Rendered::new(package.finish()?, deck.slides.len()))
    }
}

struct Deck {
    slides: Vec<Slide>,
    charts: Vec<String>,
    media: Vec<(String, ImagePart)>,
}

/// A rectangle in inches.
#[derive(Debug, Clone, Copy)]
struct Frame {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Frame {
    fn xfrm(&self, tag: &str) -> String {
        format!(
            r#"<{tag}><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{tag}>"#,
            in_to_emu(self.x),
            in_to_emu(self.y),
            in_to_emu(self.w.max(0.0)),
            in_to_emu(self.h.max(0.0)),
            tag = tag
        )
    }
}

/// Fill and outline of a text shape.
#[derive(Debug, Clone, Copy)]
struct ShapeStyle {
    geometry: &'static str,
    fill: Option<Rgb>,
    line: Option<Rgb>,
    anchor: &'static str,
}

impl ShapeStyle {
    const PLAIN: ShapeStyle = ShapeStyle {
        geometry: "rect",
        fill: None,
        line: None,
        anchor: "t",
    };

    fn anchored(mut self, anchor: &'static str) -> Self {
        self.anchor = anchor;
        self
    }
}

struct Slide {
    plan: SlidePlan,
    shapes: String,
    rels: Relationships,
    next_id: u32,
    background: Option<Rgb>,
}

impl Slide {
    fn new(kind: &'static str, title: &str, continuation: bool, top: f64) -> Self {
        let mut rels = Relationships::new();
        rels.add(
            &format!("{}/slideLayout", REL_BASE),
            "../slideLayouts/slideLayout1.xml",
        );
        Self {
            plan: SlidePlan {
                kind,
                title: title.to_string(),
                continuation,
                blocks: Vec::new(),
                cursor: top,
            },
            shapes: String::with_capacity(2048),
            rels,
            next_id: 2,
            background: None,
        }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn text_shape(&mut self, name: &str, frame: Frame, style: ShapeStyle, paragraphs: &str) {
        let id = self.shape_id();
        let fill = match style.fill {
            Some(color) => solid_fill(color),
            None => "<a:noFill/>".to_string(),
        };
        let line = match style.line {
            Some(color) => format!(r#"<a:ln w="19050">{}</a:ln>"#, solid_fill(color)),
            None => "<a:ln><a:noFill/></a:ln>".to_string(),
        };
        let _ = write!(
            self.shapes,
            concat!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name} {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
                r#"<p:spPr>{xfrm}<a:prstGeom prst="{geometry}"><a:avLst/></a:prstGeom>{fill}{line}</p:spPr>"#,
                r#"<p:txBody><a:bodyPr wrap="square" lIns="91440" tIns="45720" rIns="91440" bIns="45720" anchor="{anchor}"><a:normAutofit/></a:bodyPr>"#,
                r#"<a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
            ),
            id = id,
            name = name,
            xfrm = frame.xfrm("a:xfrm"),
            geometry = style.geometry,
            fill = fill,
            line = line,
            anchor = style.anchor,
            paragraphs = paragraphs
        );
    }

    fn line_shape(&mut self, frame: Frame, color: Rgb, dashed: bool) {
        let id = self.shape_id();
        let dash = if dashed { r#"<a:prstDash val="dash"/>"# } else { "" };
        let _ = write!(
            self.shapes,
            concat!(
                r#"<p:cxnSp><p:nvCxnSpPr><p:cNvPr id="{id}" name="Line {id}"/><p:cNvCxnSpPr/><p:nvPr/></p:nvCxnSpPr>"#,
                r#"<p:spPr>{xfrm}<a:prstGeom prst="line"><a:avLst/></a:prstGeom>"#,
                r#"<a:ln w="12700">{fill}{dash}</a:ln></p:spPr></p:cxnSp>"#
            ),
            id = id,
            xfrm = Frame { h: 0.0, ..frame }.xfrm("a:xfrm"),
            fill = solid_fill(color),
            dash = dash
        );
    }

    fn graphic_frame(&mut self, name: &str, frame: Frame, uri: &str, graphic: &str) {
        let id = self.shape_id();
        let _ = write!(
            self.shapes,
            concat!(
                r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="{name} {id}"/>"#,
                r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
                r#"{xfrm}<a:graphic><a:graphicData uri="{uri}">{graphic}</a:graphicData></a:graphic></p:graphicFrame>"#
            ),
            id = id,
            name = name,
            xfrm = frame.xfrm("p:xfrm"),
            uri = uri,
            graphic = graphic
        );
    }

    fn picture(&mut self, frame: Frame, rel: &str, descr: &str) {
        let id = self.shape_id();
        let _ = write!(
            self.shapes,
            concat!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Image {id}" descr="{descr}"/>"#,
                r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
                r#"<p:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
            ),
            id = id,
            descr = escape_xml(descr),
            rel = rel,
            xfrm = frame.xfrm("a:xfrm")
        );
    }

    fn to_xml(&self) -> String {
        let background = self
            .background
            .map(|color| {
                format!("<p:bg><p:bgPr>{}<a:effectLst/></p:bgPr></p:bg>", solid_fill(color))
            })
            .unwrap_or_default();
        format!(
            concat!(
                "{decl}<p:sld {ns}><p:cSld>{bg}<p:spTree>{group}{shapes}</p:spTree></p:cSld>",
                "<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
            ),
            decl = XML_DECLARATION,
            ns = NS_SLIDE,
            bg = background,
            group = EMPTY_GROUP,
            shapes = self.shapes
        )
    }
}

/// Text style of a run; sizes in points.
#[derive(Debug, Clone, Copy)]
struct RunStyle {
    size: f32,
    color: Rgb,
    bold: bool,
    italic: bool,
}

impl RunStyle {
    fn new(size: f32, color: Rgb) -> Self {
        Self {
            size,
            color,
            bold: false,
            italic: false,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn properties(&self) -> String {
        format!(
            r#"<a:rPr lang="fr-FR" sz="{}" b="{}" i="{}" dirty="0">{}</a:rPr>"#,
            (self.size * 100.0).round() as u32,
            u8::from(self.bold),
            u8::from(self.italic),
            solid_fill(self.color)
        )
    }
}

/// Runs for `text`; newlines become line breaks.
fn runs(text: &str, style: RunStyle) -> String {
    let properties = style.properties();
    let mut out = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            let _ = write!(out, "<a:br>{}</a:br>", properties);
        }
        let _ = write!(out, "<a:r>{}<a:t>{}</a:t></a:r>", properties, escape_xml(line));
    }
    out
}

fn paragraph(align: &str, content: &str) -> String {
    format!(r#"<a:p><a:pPr algn="{}"/>{}</a:p>"#, align, content)
}

fn solid_fill(color: Rgb) -> String {
    format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color.to_hex())
}

/// Builds slides during the section walk.
struct DeckBuilder<'a> {
    theme: &'a Theme,
    layout: &'a SlideLayout,
    slides: Vec<Slide>,
    charts: Vec<String>,
    media: Vec<(String, ImagePart)>,
    section_title: String,
}

impl<'a> DeckBuilder<'a> {
    fn new(theme: &'a Theme, layout: &'a SlideLayout) -> Self {
        Self {
            theme,
            layout,
            slides: Vec::new(),
            charts: Vec::new(),
            media: Vec::new(),
            section_title: String::new(),
        }
    }

    fn body_size(&self) -> f32 {
        self.theme.base_font_size + 4.0
    }

    fn slide(&mut self) -> &mut Slide {
        if self.slides.is_empty() {
            let title = self.section_title.clone();
            self.open("section", &title, false);
        }
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    /// Start a slide; every slide but the cover gets a title and a footer.
    fn open(&mut self, kind: &'static str, title: &str, continuation: bool) {
        let theme = self.theme;
        let layout = self.layout;
        let number = self.slides.len() + 1;
        let mut slide = Slide::new(kind, title, continuation, layout.content_top);

        if kind != "cover" {
            let frame = Frame {
                x: layout.margin_x,
                y: TITLE_TOP,
                w: layout.content_width(),
                h: TITLE_HEIGHT,
            };
            let text = runs(title, RunStyle::new(26.0, theme.primary).bold());
            slide.text_shape(
                "Title",
                frame,
                ShapeStyle::PLAIN.anchored("b"),
                &paragraph("l", &text),
            );
            slide.line_shape(
                Frame {
                    y: TITLE_TOP + TITLE_HEIGHT + 0.02,
                    h: 0.0,
                    ..frame
                },
                theme.accent,
                false,
            );

            let footer_top = layout.slide_height - 0.4;
            if let Some(ref footer) = theme.footer_text {
                let text = runs(footer, RunStyle::new(9.0, Rgb::MUTED).italic());
                slide.text_shape(
                    "Footer",
                    Frame {
                        x: layout.margin_x,
                        y: footer_top,
                        w: layout.content_width() - 1.0,
                        h: 0.3,
                    },
                    ShapeStyle::PLAIN,
                    &paragraph("l", &text),
                );
            }
            let text = runs(&number.to_string(), RunStyle::new(9.0, Rgb::MUTED));
            slide.text_shape(
                "Slide Number",
                Frame {
                    x: layout.slide_width - layout.margin_x - 1.0,
                    y: footer_top,
                    w: 1.0,
                    h: 0.3,
                },
                ShapeStyle::PLAIN,
                &paragraph("r", &text),
            );
        }
        self.slides.push(slide);
    }

    fn continue_section(&mut self) {
        let title = self.section_title.clone();
        self.open("section", &title, true);
    }

    /// Reserve `height` inches for a block, moving to a continuation slide
    /// when the block cap or the content bottom would be exceeded.
    fn place(&mut self, kind: &'static str, height: f64) -> Frame {
        let max_blocks = self.layout.max_blocks_per_slide;
        let bottom = self.layout.content_bottom;
        let slide = self.slide();
        let placed = slide.plan.blocks.len();
        let full = placed > 0 && (placed >= max_blocks || slide.plan.cursor + height > bottom);
        if full {
            self.continue_section();
        }

        let x = self.layout.margin_x;
        let w = self.layout.content_width();
        let slide = self.slide();
        let top = slide.plan.cursor;
        slide.plan.cursor += height;
        slide.plan.blocks.push(kind);
        Frame {
            x,
            y: top,
            w,
            h: (height - BLOCK_SPACING).max(0.1),
        }
    }

    fn cover(&mut self, report: &Report, generated_on: &str) {
        let theme = self.theme;
        let layout = self.layout;
        let title = theme.cover_title.as_deref().unwrap_or(&report.title);
        self.open("cover", title, false);
        let slide = self.slide();
        slide.background = Some(theme.primary);

        let width = layout.slide_width - 2.0 * layout.margin_x;
        let heading = runs(title, RunStyle::new(36.0, Rgb::WHITE).bold());
        slide.text_shape(
            "Title",
            Frame {
                x: layout.margin_x,
                y: 1.2,
                w: width,
                h: 1.4,
            },
            ShapeStyle::PLAIN.anchored("b"),
            &paragraph("l", &heading),
        );

        let subtitle = theme
            .cover_subtitle
            .as_deref()
            .or((!report.period_label.is_empty()).then_some(report.period_label.as_str()));
        let mut body = String::new();
        if let Some(subtitle) = subtitle {
            body.push_str(&paragraph(
                "l",
                &runs(subtitle, RunStyle::new(20.0, theme.accent.lighten(0.4))),
            ));
        }
        if !report.description.is_empty() {
            body.push_str(&paragraph(
                "l",
                &runs(&report.description, RunStyle::new(14.0, Rgb::WHITE)),
            ));
        }
        if !body.is_empty() {
            slide.text_shape(
                "Subtitle",
                Frame {
                    x: layout.margin_x,
                    y: 2.7,
                    w: width,
                    h: 1.3,
                },
                ShapeStyle::PLAIN,
                &body,
            );
        }

        let mut meta = Vec::new();
        if !report.author.is_empty() {
            meta.push(report.author.clone());
        }
        meta.push(format!("Généré le {}", generated_on));
        let text = runs(&meta.join("  ·  "), RunStyle::new(12.0, theme.primary.lighten(0.8)));
        slide.text_shape(
            "Metadata",
            Frame {
                x: layout.margin_x,
                y: layout.slide_height - 1.0,
                w: width,
                h: 0.5,
            },
            ShapeStyle::PLAIN,
            &paragraph("l", &text),
        );
    }

    fn contents(&mut self, content: &Content) {
        let theme = self.theme;
        let layout = self.layout;
        let size = self.body_size();
        self.open("contents", "Sommaire", false);

        let mut body = String::new();
        for entry in outline(content, 2) {
            let (style, indent) = if entry.depth > 1 {
                (RunStyle::new(size - 2.0, Rgb::TEXT), 457_200)
            } else {
                (RunStyle::new(size, theme.primary).bold(), 0)
            };
            let _ = write!(
                body,
                r#"<a:p><a:pPr marL="{}"/>{}</a:p>"#,
                indent,
                runs(&format!("{}  {}", entry.number, entry.title), style)
            );
        }
        let slide = self.slide();
        slide.text_shape(
            "Contents",
            Frame {
                x: layout.margin_x,
                y: layout.content_top,
                w: layout.content_width(),
                h: layout.content_bottom - layout.content_top,
            },
            ShapeStyle::PLAIN,
            &body,
        );
    }

    fn paragraph_block(&mut self, text: &str) {
        let style = RunStyle::new(self.body_size(), Rgb::TEXT);
        let frame = self.place("paragraph", self.layout.paragraph);
        self.slide()
            .text_shape("Text", frame, ShapeStyle::PLAIN, &paragraph("l", &runs(text, style)));
    }

    fn heading(&mut self, level: u8, text: &str) {
        let size = (22.0 - 2.0 * f32::from(level.max(1) - 1)).max(self.body_size());
        let style = RunStyle::new(size, self.theme.secondary).bold();
        let frame = self.place("heading", self.layout.heading);
        self.slide().text_shape(
            "Heading",
            frame,
            ShapeStyle::PLAIN.anchored("b"),
            &paragraph("l", &runs(text, style)),
        );
    }

    /// Lists taller than a slide are split into runs that each fit the
    /// content area; numbering carries over between runs.
    fn list(&mut self, list_type: ListType, items: &[ListItem]) {
        let layout = self.layout;
        let usable = layout.content_bottom - layout.content_top;
        let per_slide = ((usable / layout.list_item).floor() as usize).max(1);
        if items.is_empty() {
            self.list_run(list_type, items, 0);
            return;
        }
        for (n, run) in items.chunks(per_slide).enumerate() {
            self.list_run(list_type, run, n * per_slide);
        }
    }

    fn list_run(&mut self, list_type: ListType, items: &[ListItem], start: usize) {
        let style = RunStyle::new(self.body_size(), Rgb::TEXT);
        let height = self.layout.list_item * items.len().max(1) as f64;
        let frame = self.place("list", height);
        let bullet = match list_type {
            ListType::Bulleted => {
                r#"<a:buFont typeface="Arial"/><a:buChar char="•"/>"#.to_string()
            }
            ListType::Numbered if start > 0 => format!(
                r#"<a:buFont typeface="+mj-lt"/><a:buAutoNum type="arabicPeriod" startAt="{}"/>"#,
                start + 1
            ),
            ListType::Numbered => {
                r#"<a:buFont typeface="+mj-lt"/><a:buAutoNum type="arabicPeriod"/>"#.to_string()
            }
        };
        let mut body = String::new();
        for item in items {
            let _ = write!(
                body,
                r#"<a:p><a:pPr marL="285750" indent="-285750">{}</a:pPr>{}</a:p>"#,
                bullet,
                runs(&item.content, style)
            );
        }
        self.slide().text_shape("List", frame, ShapeStyle::PLAIN, &body);
    }

    fn table(&mut self, table: &Table) {
        if table.headers.is_empty() {
            log::debug!("Skipping table without headers");
            return;
        }
        let layout = self.layout;
        let shown = table.rows.len().min(layout.max_table_rows);
        let hidden = table.rows.len() - shown;
        let lines = (shown + 2).min(layout.table_rows_cap);
        let frame = self.place("table", lines as f64 * layout.table_row + layout.table_padding);

        let columns = table.headers.len();
        let column_width = in_to_emu(frame.w / columns as f64);
        let row_height = in_to_emu(layout.table_row);
        let size = (self.theme.base_font_size).max(8.0);

        let mut xml = String::from(r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>"#);
        for _ in 0..columns {
            let _ = write!(xml, r#"<a:gridCol w="{}"/>"#, column_width);
        }
        xml.push_str("</a:tblGrid>");

        let _ = write!(xml, r#"<a:tr h="{}">"#, row_height);
        for header in &table.headers {
            let text = runs(&header.label, RunStyle::new(size, Rgb::WHITE).bold());
            xml.push_str(&table_cell(&text, header.alignment(), self.theme.primary, ""));
        }
        xml.push_str("</a:tr>");

        for (i, row) in table.rows.iter().take(shown).enumerate() {
            let fill = if i % 2 == 1 { Rgb::ZEBRA } else { Rgb::WHITE };
            let _ = write!(xml, r#"<a:tr h="{}">"#, row_height);
            for header in &table.headers {
                let text = runs(
                    &truncate(&table.cell_text(row, header), 60),
                    RunStyle::new(size, Rgb::TEXT),
                );
                xml.push_str(&table_cell(&text, header.alignment(), fill, ""));
            }
            xml.push_str("</a:tr>");
        }

        if hidden > 0 {
            let _ = write!(xml, r#"<a:tr h="{}">"#, row_height);
            let text = runs(
                &format!("… {} lignes supplémentaires", hidden),
                RunStyle::new(size, Rgb::MUTED).italic(),
            );
            xml.push_str(&table_cell(
                &text,
                Alignment::Center,
                Rgb::WHITE,
                &format!(r#" gridSpan="{}""#, columns),
            ));
            for _ in 1..columns {
                xml.push_str(&table_cell("", Alignment::Left, Rgb::WHITE, r#" hMerge="1""#));
            }
            xml.push_str("</a:tr>");
        }
        xml.push_str("</a:tbl>");

        self.slide().graphic_frame(
            "Table",
            frame,
            "http://schemas.openxmlformats.org/drawingml/2006/table",
            &xml,
        );
    }

    fn kpi(&mut self, kpi: &KpiCard) {
        let trend = kpi.trend();
        let frame = self.place("kpi_card", self.layout.kpi_card);
        let frame = Frame {
            w: frame.w.min(4.0),
            ..frame
        };

        let mut body = paragraph("l", &runs(&kpi.label, RunStyle::new(12.0, Rgb::MUTED)));
        let mut value = runs(&kpi.display_value(), RunStyle::new(28.0, Rgb::TEXT).bold());
        if let Some(change) = kpi.formatted_change() {
            value.push_str(&runs(
                &format!("  {}", change),
                RunStyle::new(14.0, trend.color()).bold(),
            ));
        }
        body.push_str(&paragraph("l", &value));

        let style = ShapeStyle {
            geometry: "roundRect",
            fill: Some(Rgb::ZEBRA),
            line: Some(trend.color()),
            anchor: "ctr",
        };
        self.slide().text_shape("KPI", frame, style, &body);
    }

    fn callout(&mut self, variant: CalloutVariant, title: Option<&str>, content: &str) {
        let color = variant.color();
        let size = self.body_size();
        let frame = self.place("callout", self.layout.callout);
        let mut body = paragraph(
            "l",
            &runs(title.unwrap_or(variant.label()), RunStyle::new(size, color).bold()),
        );
        body.push_str(&paragraph("l", &runs(content, RunStyle::new(size - 1.0, Rgb::TEXT))));
        let style = ShapeStyle {
            geometry: "rect",
            fill: Some(color.lighten(0.88)),
            line: Some(color),
            anchor: "ctr",
        };
        self.slide().text_shape("Callout", frame, style, &body);
    }

    fn divider(&mut self, style: DividerStyle) {
        let frame = self.place("divider", self.layout.divider);
        let color = self.theme.secondary.lighten(0.5);
        let line = Frame {
            y: frame.y + frame.h / 2.0,
            ..frame
        };
        self.slide()
            .line_shape(line, color, style == DividerStyle::Dashed);
    }

    fn quote(&mut self, content: &str, author: Option<&str>) {
        let size = self.body_size();
        let height = if author.is_some() {
            self.layout.quote_with_author
        } else {
            self.layout.quote
        };
        let frame = self.place("quote", height);
        let mut body = paragraph(
            "l",
            &runs(&format!("« {} »", content), RunStyle::new(size, Rgb::TEXT).italic()),
        );
        if let Some(author) = author {
            body.push_str(&paragraph(
                "r",
                &runs(&format!("— {}", author), RunStyle::new(size - 2.0, Rgb::MUTED)),
            ));
        }
        let style = ShapeStyle {
            line: None,
            fill: Some(self.theme.accent.lighten(0.92)),
            ..ShapeStyle::PLAIN
        };
        self.slide().text_shape("Quote", frame, style, &body);
    }

    fn placeholder(&mut self, kind: &'static str, label: &str) {
        let size = self.body_size();
        let frame = self.place(kind, self.layout.chart_placeholder);
        let text = runs(label, RunStyle::new(size, Rgb::MUTED).italic());
        self.slide().text_shape(
            "Placeholder",
            frame,
            ShapeStyle::PLAIN.anchored("ctr"),
            &paragraph("ctr", &text),
        );
    }

    fn chart(&mut self, chart: &Chart) {
        match embed_chart(chart, self.theme) {
            Embed::Native(part) => {
                self.charts.push(part.xml);
                let n = self.charts.len();
                let frame = self.place("chart", self.layout.chart);
                let slide = self.slide();
                let rel = slide.rels.add(REL_CHART, &format!("../charts/chart{}.xml", n));
                let graphic = format!(
                    r#"<c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="{}"/>"#,
                    rel
                );
                slide.graphic_frame(
                    "Chart",
                    frame,
                    "http://schemas.openxmlformats.org/drawingml/2006/chart",
                    &graphic,
                );
            }
            Embed::Placeholder(failure) => {
                log::warn!(
                    "Chart \"{}\" rendered as placeholder: {}",
                    chart.display_title(),
                    failure
                );
                self.placeholder("chart", &format!("[Graphique] {}", chart.display_title()));
            }
        }
    }

    fn image(&mut self, src: &str, alt: Option<&str>, caption: Option<&str>) {
        let part = match embed_image(src) {
            Embed::Native(part) => part,
            Embed::Placeholder(failure) => {
                log::warn!("Image rendered as placeholder: {}", failure);
                let label = match alt {
                    Some(alt) if !alt.is_empty() => format!("[Image] {}", alt),
                    _ => "[Image]".to_string(),
                };
                self.placeholder("image", &label);
                return;
            }
        };

        let frame = self.place("image", self.layout.image);
        let caption_height = if caption.is_some() { 0.35 } else { 0.0 };
        let available = Frame {
            h: frame.h - caption_height,
            ..frame
        };
        let picture = match part.pixel_size.filter(|&(w, h)| w > 0 && h > 0) {
            Some((w, h)) => {
                let ratio = f64::from(h) / f64::from(w);
                let width = available.w.min(available.h / ratio);
                let height = width * ratio;
                Frame {
                    x: available.x + (available.w - width) / 2.0,
                    y: available.y,
                    w: width,
                    h: height,
                }
            }
            None => available,
        };

        let n = self.media.len() + 1;
        let name = format!("image{}.{}", n, part.extension);
        let slide = self.slide();
        let rel = slide.rels.add(REL_IMAGE, &format!("../media/{}", name));
        slide.picture(picture, &rel, alt.unwrap_or(""));
        if let Some(caption) = caption {
            let text = runs(caption, RunStyle::new(10.0, Rgb::MUTED).italic());
            slide.text_shape(
                "Caption",
                Frame {
                    y: available.y + available.h,
                    h: caption_height,
                    ..frame
                },
                ShapeStyle::PLAIN,
                &paragraph("ctr", &text),
            );
        }
        self.media.push((name, part));
    }
}

impl ContentVisitor for DeckBuilder<'_> {
    fn enter_section(&mut self, section: &Section, _path: &[usize]) {
        self.section_title = section.title.clone();
        self.open("section", &section.title, false);
    }

    fn visit_block(&mut self, _section: &Section, block: &Block) {
        match block {
            Block::Paragraph { content } => self.paragraph_block(content),
            Block::Heading { level, content } => self.heading(*level, content),
            Block::List { list_type, items } => self.list(*list_type, items),
            Block::Table(table) => self.table(table),
            Block::KpiCard(kpi) => self.kpi(kpi),
            Block::Callout {
                variant,
                title,
                content,
            } => self.callout(*variant, title.as_deref(), content),
            Block::Divider { style } => self.divider(*style),
            Block::Pagebreak => {
                if !self.slide().plan.blocks.is_empty() {
                    self.continue_section();
                }
            }
            Block::Quote { content, author } => self.quote(content, author.as_deref()),
            Block::Chart(chart) => self.chart(chart),
            Block::Image { src, alt, caption } => {
                self.image(src, alt.as_deref(), caption.as_deref())
            }
        }
    }
}

fn table_cell(text: &str, alignment: Alignment, fill: Rgb, attributes: &str) -> String {
    let align = match alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
    };
    format!(
        concat!(
            r#"<a:tc{}><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:pPr algn="{}"/>{}</a:p></a:txBody>"#,
            r#"<a:tcPr marL="45720" marR="45720" marT="22860" marB="22860">{}</a:tcPr></a:tc>"#
        ),
        attributes,
        align,
        text,
        solid_fill(fill)
    )
}

fn slide_master_xml() -> String {
    format!(
        concat!(
            "{decl}<p:sldMaster {ns}><p:cSld><p:bg><p:bgRef idx=\"1001\"><a:schemeClr val=\"bg1\"/></p:bgRef></p:bg>",
            "<p:spTree>{group}</p:spTree></p:cSld>",
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3""#,
            r#" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
        ),
        decl = XML_DECLARATION,
        ns = NS_SLIDE,
        group = EMPTY_GROUP
    )
}

fn slide_layout_xml() -> String {
    format!(
        concat!(
            "{decl}<p:sldLayout {ns} type=\"blank\" preserve=\"1\"><p:cSld name=\"Vide\">",
            "<p:spTree>{group}</p:spTree></p:cSld>",
            "<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"
        ),
        decl = XML_DECLARATION,
        ns = NS_SLIDE,
        group = EMPTY_GROUP
    )
}
