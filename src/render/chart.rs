//! Native embedding of charts and images.
//!
//! Embedding never fails the export: every attempt yields an [`Embed`]
//! value, either the native part or the reason it degraded to a
//! placeholder. Renderers that cannot embed anything (PDF, Markdown) only
//! use the colour palette from here.

use std::fmt;
use std::fmt::Write as _;

use base64::Engine as _;

use crate::error::Error;
use crate::model::{Chart, ChartKind, Dataset, Rgb, Theme};
use crate::text::escape_xml;

/// Outcome of an embedding attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Embed<T> {
    /// Embedded natively
    Native(T),
    /// Degraded to a placeholder
    Placeholder(EmbeddingFailure),
}

impl<T> Embed<T> {
    /// Check if the embedding succeeded.
    pub fn is_native(&self) -> bool {
        matches!(self, Embed::Native(_))
    }
}

/// Outcome of a chart embedding attempt.
pub type ChartEmbed = Embed<ChartPart>;

/// Outcome of an image embedding attempt.
pub type ImageEmbed = Embed<ImagePart>;

/// Why a chart or image was not embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingFailure {
    /// Human readable reason
    pub reason: String,
}

impl EmbeddingFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl From<EmbeddingFailure> for Error {
    fn from(failure: EmbeddingFailure) -> Self {
        Error::Embedding(failure.reason)
    }
}

/// A DrawingML chart part ready to be stored in a package.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPart {
    /// Mapped chart kind
    pub kind: ChartKind,
    /// `c:chartSpace` document
    pub xml: String,
}

/// A decoded raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// Raw file bytes
    pub bytes: Vec<u8>,
    /// File extension inside the package ("png" or "jpeg")
    pub extension: &'static str,
    /// Pixel size when it can be read from the header
    pub pixel_size: Option<(u32, u32)>,
}

const PALETTE: [Rgb; 6] = [
    Rgb::new(16, 185, 129),
    Rgb::new(245, 158, 11),
    Rgb::new(139, 92, 246),
    Rgb::new(236, 72, 153),
    Rgb::new(20, 184, 166),
    Rgb::new(239, 68, 68),
];

/// Colour of the `index`-th series: its own colour when valid, else the
/// theme colours followed by a fixed palette.
pub fn series_color(theme: &Theme, dataset: &Dataset, index: usize) -> Rgb {
    if let Some(color) = dataset.color.as_deref().and_then(Rgb::from_hex) {
        return color;
    }
    palette_color(theme, index)
}

/// Colour of the `index`-th category slice (pie and doughnut charts).
pub fn palette_color(theme: &Theme, index: usize) -> Rgb {
    match index {
        0 => theme.primary,
        1 => theme.accent,
        2 => theme.secondary,
        n => PALETTE[(n - 3) % PALETTE.len()],
    }
}

/// Try to build a native chart part.
pub fn embed_chart(chart: &Chart, theme: &Theme) -> ChartEmbed {
    let Some(kind) = chart.kind() else {
        return Embed::Placeholder(EmbeddingFailure::new(format!(
            "Type de graphique non pris en charge: {}",
            chart.chart_type
        )));
    };
    if !chart.has_data() {
        return Embed::Placeholder(EmbeddingFailure::new("Données du graphique absentes"));
    }
    let labels = chart.data.labels.len();
    for dataset in &chart.data.datasets {
        if dataset.data.len() != labels {
            return Embed::Placeholder(EmbeddingFailure::new(format!(
                "Série \"{}\": {} valeurs pour {} libellés",
                dataset.label,
                dataset.data.len(),
                labels
            )));
        }
        if dataset.data.iter().any(|v| !v.is_finite()) {
            return Embed::Placeholder(EmbeddingFailure::new(format!(
                "Série \"{}\": valeur non numérique",
                dataset.label
            )));
        }
    }

    Embed::Native(ChartPart {
        kind,
        xml: chart_space_xml(chart, kind, theme),
    })
}

fn chart_space_xml(chart: &Chart, kind: ChartKind, theme: &Theme) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(concat!(
        r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart""#,
        r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
        r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        r#"<c:roundedCorners val="0"/><c:chart>"#
    ));

    if let Some(ref title) = chart.config.title {
        let _ = write!(
            xml,
            r#"<c:title><c:tx><c:rich><a:bodyPr/><a:p><a:pPr><a:defRPr sz="1400" b="1"/></a:pPr><a:r><a:rPr lang="fr-FR" sz="1400" b="1"/><a:t>{}</a:t></a:r></a:p></c:rich></c:tx><c:overlay val="0"/></c:title><c:autoTitleDeleted val="0"/>"#,
            escape_xml(title)
        );
    } else {
        xml.push_str(r#"<c:autoTitleDeleted val="1"/>"#);
    }

    xml.push_str("<c:plotArea><c:layout/>");
    let radial = matches!(kind, ChartKind::Pie | ChartKind::Doughnut);
    match kind {
        ChartKind::Bar => {
            xml.push_str(r#"<c:barChart><c:barDir val="col"/><c:grouping val="clustered"/><c:varyColors val="0"/>"#);
            write_series(&mut xml, chart, theme, SeriesStyle::Fill);
            xml.push_str(r#"<c:gapWidth val="150"/>"#);
            push_axis_ids(&mut xml);
            xml.push_str("</c:barChart>");
        }
        ChartKind::Line => {
            xml.push_str(r#"<c:lineChart><c:grouping val="standard"/><c:varyColors val="0"/>"#);
            write_series(&mut xml, chart, theme, SeriesStyle::Line);
            xml.push_str(r#"<c:marker val="1"/>"#);
            push_axis_ids(&mut xml);
            xml.push_str("</c:lineChart>");
        }
        ChartKind::Area => {
            xml.push_str(r#"<c:areaChart><c:grouping val="standard"/><c:varyColors val="0"/>"#);
            write_series(&mut xml, chart, theme, SeriesStyle::Fill);
            push_axis_ids(&mut xml);
            xml.push_str("</c:areaChart>");
        }
        ChartKind::Pie => {
            xml.push_str(r#"<c:pieChart><c:varyColors val="1"/>"#);
            write_series(&mut xml, chart, theme, SeriesStyle::Slices);
            xml.push_str(r#"<c:firstSliceAng val="0"/></c:pieChart>"#);
        }
        ChartKind::Doughnut => {
            xml.push_str(r#"<c:doughnutChart><c:varyColors val="1"/>"#);
            write_series(&mut xml, chart, theme, SeriesStyle::Slices);
            xml.push_str(r#"<c:firstSliceAng val="0"/><c:holeSize val="50"/></c:doughnutChart>"#);
        }
    }

    if !radial {
        xml.push_str(concat!(
            r#"<c:catAx><c:axId val="50010001"/><c:scaling><c:orientation val="minMax"/></c:scaling>"#,
            r#"<c:delete val="0"/><c:axPos val="b"/><c:numFmt formatCode="General" sourceLinked="0"/>"#,
            r#"<c:tickLblPos val="nextTo"/><c:crossAx val="50010002"/><c:crosses val="autoZero"/>"#,
            r#"<c:auto val="1"/><c:lblAlgn val="ctr"/><c:lblOffset val="100"/></c:catAx>"#,
            r#"<c:valAx><c:axId val="50010002"/><c:scaling><c:orientation val="minMax"/></c:scaling>"#,
            r#"<c:delete val="0"/><c:axPos val="l"/><c:majorGridlines/>"#,
            r#"<c:numFmt formatCode="General" sourceLinked="0"/><c:tickLblPos val="nextTo"/>"#,
            r#"<c:crossAx val="50010001"/><c:crosses val="autoZero"/><c:crossBetween val="between"/></c:valAx>"#
        ));
    }
    xml.push_str("</c:plotArea>");

    if chart.config.legend != Some(false) {
        xml.push_str(r#"<c:legend><c:legendPos val="b"/><c:overlay val="0"/></c:legend>"#);
    }
    xml.push_str(r#"<c:plotVisOnly val="1"/></c:chart></c:chartSpace>"#);
    xml
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SeriesStyle {
    Fill,
    Line,
    Slices,
}

fn push_axis_ids(xml: &mut String) {
    xml.push_str(r#"<c:axId val="50010001"/><c:axId val="50010002"/>"#);
}

fn write_series(xml: &mut String, chart: &Chart, theme: &Theme, style: SeriesStyle) {
    // Radial charts plot a single series.
    let datasets = match style {
        SeriesStyle::Slices => &chart.data.datasets[..1],
        _ => &chart.data.datasets[..],
    };

    for (i, dataset) in datasets.iter().enumerate() {
        let color = series_color(theme, dataset, i).to_hex();
        let _ = write!(
            xml,
            r#"<c:ser><c:idx val="{i}"/><c:order val="{i}"/><c:tx><c:v>{}</c:v></c:tx>"#,
            escape_xml(&dataset.label)
        );
        match style {
            SeriesStyle::Fill => {
                let _ = write!(
                    xml,
                    r#"<c:spPr><a:solidFill><a:srgbClr val="{color}"/></a:solidFill></c:spPr><c:invertIfNegative val="0"/>"#
                );
            }
            SeriesStyle::Line => {
                let _ = write!(
                    xml,
                    r#"<c:spPr><a:ln w="28575"><a:solidFill><a:srgbClr val="{color}"/></a:solidFill></a:ln></c:spPr><c:marker><c:symbol val="circle"/><c:size val="5"/></c:marker>"#
                );
            }
            SeriesStyle::Slices => {
                for point in 0..chart.data.labels.len() {
                    let _ = write!(
                        xml,
                        r#"<c:dPt><c:idx val="{point}"/><c:bubble3D val="0"/><c:spPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill></c:spPr></c:dPt>"#,
                        palette_color(theme, point).to_hex()
                    );
                }
            }
        }

        let count = chart.data.labels.len();
        let _ = write!(xml, r#"<c:cat><c:strLit><c:ptCount val="{count}"/>"#);
        for (idx, label) in chart.data.labels.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<c:pt idx="{idx}"><c:v>{}</c:v></c:pt>"#,
                escape_xml(label)
            );
        }
        xml.push_str("</c:strLit></c:cat>");

        let _ = write!(
            xml,
            r#"<c:val><c:numLit><c:formatCode>General</c:formatCode><c:ptCount val="{count}"/>"#
        );
        for (idx, value) in dataset.data.iter().enumerate() {
            let _ = write!(xml, r#"<c:pt idx="{idx}"><c:v>{value}</c:v></c:pt>"#);
        }
        xml.push_str("</c:numLit></c:val>");
        if style == SeriesStyle::Line {
            xml.push_str(r#"<c:smooth val="0"/>"#);
        }
        xml.push_str("</c:ser>");
    }
}

/// Try to decode an image source into an embeddable part.
///
/// Only `data:image/png;base64,` and `data:image/jpeg;base64,` sources
/// are embedded; remote URLs are never fetched.
pub fn embed_image(src: &str) -> ImageEmbed {
    let Some(rest) = src.strip_prefix("data:") else {
        return Embed::Placeholder(EmbeddingFailure::new("Image externe non intégrée"));
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Embed::Placeholder(EmbeddingFailure::new("URL de données invalide"));
    };
    let Some(mime) = meta.strip_suffix(";base64") else {
        return Embed::Placeholder(EmbeddingFailure::new("Encodage d'image non pris en charge"));
    };
    let extension = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpeg",
        other => {
            return Embed::Placeholder(EmbeddingFailure::new(format!(
                "Format d'image non pris en charge: {}",
                other
            )))
        }
    };

    let b64 = base64::engine::general_purpose::STANDARD;
    let bytes = match b64.decode(payload.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return Embed::Placeholder(EmbeddingFailure::new("Image vide")),
        Err(e) => {
            return Embed::Placeholder(EmbeddingFailure::new(format!(
                "Image base64 invalide: {}",
                e
            )))
        }
    };

    let pixel_size = match extension {
        "png" => png_size(&bytes),
        _ => jpeg_size(&bytes),
    };
    Embed::Native(ImagePart {
        bytes,
        extension,
        pixel_size,
    })
}

fn png_size(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if bytes.len() < 24 || bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (width > 0 && height > 0).then_some((width, height))
}

fn jpeg_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 9 < bytes.len() {
        if bytes[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = bytes[pos + 1];
        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        // SOF0..SOF15, except DHT (C4), JPG (C8) and DAC (CC).
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = u32::from(u16::from_be_bytes([bytes[pos + 5], bytes[pos + 6]]));
            let width = u32::from(u16::from_be_bytes([bytes[pos + 7], bytes[pos + 8]]));
            return (width > 0 && height > 0).then_some((width, height));
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChartData;

    fn sales_chart(kind: &str) -> Chart {
        Chart::new(
            kind,
            ChartData {
                labels: vec!["Jan".into(), "Fév".into(), "Mar".into()],
                datasets: vec![
                    Dataset::new("2023", vec![1.0, 2.0, 3.0]),
                    Dataset::new("2024", vec![2.0, 2.5, 4.0]),
                ],
            },
        )
        .with_title("Ventes")
    }

    #[test]
    fn test_embed_bar_chart() {
        let theme = Theme::default();
        match embed_chart(&sales_chart("stacked-bar"), &theme) {
            Embed::Native(part) => {
                assert_eq!(part.kind, ChartKind::Bar);
                assert!(part.xml.contains("<c:barChart>"));
                assert_eq!(part.xml.matches("<c:ser>").count(), 2);
                assert!(part.xml.contains("<c:v>Fév</c:v>"));
                assert!(part.xml.contains("<c:v>2.5</c:v>"));
                assert!(part.xml.contains("<a:t>Ventes</a:t>"));
            }
            Embed::Placeholder(failure) => panic!("unexpected placeholder: {}", failure),
        }
    }

    #[test]
    fn test_embed_pie_uses_first_series() {
        let theme = Theme::default();
        let Embed::Native(part) = embed_chart(&sales_chart("pie"), &theme) else {
            panic!("pie should embed");
        };
        assert_eq!(part.xml.matches("<c:ser>").count(), 1);
        assert_eq!(part.xml.matches("<c:dPt>").count(), 3);
        assert!(!part.xml.contains("<c:catAx>"));
    }

    #[test]
    fn test_embed_chart_failures() {
        let theme = Theme::default();
        let radar = embed_chart(&sales_chart("radar"), &theme);
        assert!(!radar.is_native());

        let mut broken = sales_chart("line");
        broken.data.datasets[1].data.pop();
        match embed_chart(&broken, &theme) {
            Embed::Placeholder(failure) => assert!(failure.reason.contains("2 valeurs pour 3")),
            Embed::Native(_) => panic!("mismatched series should not embed"),
        }
    }

    #[test]
    fn test_series_color_prefers_dataset() {
        let theme = Theme::default();
        let mut dataset = Dataset::new("a", vec![]);
        assert_eq!(series_color(&theme, &dataset, 0), theme.primary);
        dataset.color = Some("#ff0000".into());
        assert_eq!(series_color(&theme, &dataset, 0), Rgb::new(255, 0, 0));
        assert_eq!(palette_color(&theme, 3), PALETTE[0]);
    }

    #[test]
    fn test_embed_image() {
        // 1x1 transparent PNG
        let png = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        match embed_image(png) {
            Embed::Native(part) => {
                assert_eq!(part.extension, "png");
                assert_eq!(part.pixel_size, Some((1, 1)));
            }
            Embed::Placeholder(failure) => panic!("unexpected placeholder: {}", failure),
        }

        assert!(!embed_image("https://example.com/logo.png").is_native());
        assert!(!embed_image("data:image/svg+xml;base64,PHN2Zz4=").is_native());
        assert!(!embed_image("data:image/png;base64,***").is_native());
    }
}
