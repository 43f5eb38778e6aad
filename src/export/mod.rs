//! Format dispatcher.
//!
//! [`export`] maps a format identifier onto one renderer, runs it behind an
//! error boundary and wraps the outcome into an [`ExportResult`]. Renderer
//! errors and panics both come back as a failed result, never as a panic
//! in the caller.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use rapport::export::export;
//! use rapport::model::{Block, Content, Report, Section};
//! use rapport::ExportOptions;
//!
//! let report = Report::new("r1", "Bilan T1", Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap());
//! let content = Content::new(vec![
//!     Section::new("s1", "Synthèse", 1).with_block(Block::paragraph("Trimestre en hausse.")),
//! ]);
//!
//! let result = export(&report, &content, "markdown", &ExportOptions::default());
//! assert!(result.success);
//! assert_eq!(result.filename.as_deref(), Some("Bilan_T1.md"));
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::layout::{MarginProfile, Orientation, PageSize};
use crate::model::{Content, DesignSettings, Document, Report};
use crate::render::{
    DocumentRenderer, DocxRenderer, ExportOptions, HtmlRenderer, MarkdownRenderer, PdfRenderer,
    PptxRenderer, SlideLayout, XlsxRenderer,
};
use crate::text::sanitize_filename;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Paginated PDF
    Pdf,
    /// Word document
    Docx,
    /// Excel workbook
    Xlsx,
    /// Standalone HTML page
    Html,
    /// Markdown text
    Markdown,
    /// PowerPoint deck
    Pptx,
}

impl ExportFormat {
    /// Every format, in display order.
    pub const ALL: [ExportFormat; 6] = [
        ExportFormat::Pdf,
        ExportFormat::Docx,
        ExportFormat::Xlsx,
        ExportFormat::Html,
        ExportFormat::Markdown,
        ExportFormat::Pptx,
    ];

    /// Format identifier accepted by [`export`].
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Pptx => "pptx",
        }
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            other => other.as_str(),
        }
    }

    /// MIME type of the produced file.
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }

    /// What the unit count of this format measures.
    pub fn unit_label(self) -> &'static str {
        match self {
            ExportFormat::Pdf | ExportFormat::Docx => "pages",
            ExportFormat::Xlsx => "feuilles",
            ExportFormat::Pptx => "diapositives",
            ExportFormat::Html | ExportFormat::Markdown => "document",
        }
    }

    /// Create the renderer for this format.
    pub fn renderer(self, options: ExportOptions) -> Box<dyn DocumentRenderer> {
        match self {
            ExportFormat::Pdf => Box::new(PdfRenderer::new(options)),
            ExportFormat::Docx => Box::new(DocxRenderer::new(options)),
            ExportFormat::Xlsx => Box::new(XlsxRenderer::new(options)),
            ExportFormat::Html => Box::new(HtmlRenderer::new(options)),
            ExportFormat::Markdown => Box::new(MarkdownRenderer::new(options)),
            ExportFormat::Pptx => Box::new(PptxRenderer::new(options)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ExportFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

/// Outcome of an export.
///
/// `bytes` and `filename` are set iff `success`; `error` is set iff not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Whether the export produced a file
    pub success: bool,

    /// Encoded document
    pub bytes: Option<Vec<u8>>,

    /// Suggested filename: sanitized title plus extension
    pub filename: Option<String>,

    /// Failure message
    pub error: Option<String>,

    /// MIME type, when the format was recognized
    pub mime_type: Option<&'static str>,

    /// Pages, slides or sheets produced (1 for single-flow text formats)
    pub unit_count: usize,
}

impl ExportResult {
    fn succeeded(format: ExportFormat, title: &str, bytes: Vec<u8>, units: usize) -> Self {
        Self {
            success: true,
            bytes: Some(bytes),
            filename: Some(format!("{}.{}", sanitize_filename(title), format.extension())),
            error: None,
            mime_type: Some(format.mime_type()),
            unit_count: units,
        }
    }

    fn failed(format: Option<ExportFormat>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            bytes: None,
            filename: None,
            error: Some(message.into()),
            mime_type: format.map(ExportFormat::mime_type),
            unit_count: 0,
        }
    }

    /// Size of the produced document in bytes (0 on failure).
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    /// Check if no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into a `Result`, failing with a render error on failure.
    pub fn into_result(self) -> Result<(String, Vec<u8>)> {
        match (self.success, self.filename, self.bytes) {
            (true, Some(filename), Some(bytes)) => Ok((filename, bytes)),
            _ => Err(Error::Render(
                self.error
                    .unwrap_or_else(|| "Export échoué".to_string()),
            )),
        }
    }
}

/// Export a report in the format named by `format`.
///
/// An unknown format fails with `Format non supporté: <format>` before any
/// renderer runs.
pub fn export(
    report: &Report,
    content: &Content,
    format: &str,
    options: &ExportOptions,
) -> ExportResult {
    match format.parse::<ExportFormat>() {
        Ok(format) => export_as(report, content, format, options),
        Err(e) => {
            log::error!("Export of \"{}\" rejected: {}", report.title, e);
            ExportResult::failed(None, e.to_string())
        }
    }
}

/// Export a report in a known format.
pub fn export_as(
    report: &Report,
    content: &Content,
    format: ExportFormat,
    options: &ExportOptions,
) -> ExportResult {
    for violation in content.validate() {
        log::warn!("Document model violation: {}", violation);
    }

    let renderer = format.renderer(options.clone());
    run_renderer(renderer.as_ref(), format, report, content)
}

/// Run one renderer behind the error boundary.
fn run_renderer(
    renderer: &dyn DocumentRenderer,
    format: ExportFormat,
    report: &Report,
    content: &Content,
) -> ExportResult {
    log::debug!("Exporting \"{}\" with the {} renderer", report.title, renderer.name());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(report, content)));
    match outcome {
        Ok(Ok(rendered)) => {
            log::debug!(
                "{} export done: {} bytes, {} {}",
                format,
                rendered.len(),
                rendered.units,
                format.unit_label()
            );
            ExportResult::succeeded(format, &report.title, rendered.bytes, rendered.units)
        }
        Ok(Err(e)) => {
            log::error!("{} export of \"{}\" failed: {}", format, report.title, e);
            ExportResult::failed(Some(format), e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("{} renderer panicked on \"{}\": {}", format, report.title, message);
            ExportResult::failed(Some(format), message)
        }
    }
}

/// Export a bundled document; its design settings apply unless `options`
/// already carries some.
pub fn export_document(document: &Document, format: &str, options: &ExportOptions) -> ExportResult {
    let options = merge_design(options, document.design.as_ref());
    export(&document.report, &document.content, format, &options)
}

fn merge_design(options: &ExportOptions, design: Option<&DesignSettings>) -> ExportOptions {
    let mut options = options.clone();
    if options.design.is_none() {
        options.design = design.cloned();
    }
    options
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Erreur inattendue pendant le rendu".to_string()
    }
}

/// Builder bundling export options and design settings.
///
/// # Example
///
/// ```
/// use rapport::{Exporter, ExportFormat};
/// use rapport::layout::{Orientation, PageSize};
///
/// let exporter = Exporter::new()
///     .with_page_size(PageSize::Letter)
///     .with_orientation(Orientation::Landscape)
///     .without_cover_page();
/// assert!(!exporter.options().include_cover_page);
/// assert_eq!(ExportFormat::Markdown.extension(), "md");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    /// Create a new exporter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing options.
    pub fn with_options(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Set the paper size.
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.options = self.options.with_page_size(size);
        self
    }

    /// Set the page orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.options = self.options.with_orientation(orientation);
        self
    }

    /// Set the margin profile.
    pub fn with_margins(mut self, margins: MarginProfile) -> Self {
        self.options = self.options.with_margins(margins);
        self
    }

    /// Skip the cover page.
    pub fn without_cover_page(mut self) -> Self {
        self.options = self.options.with_cover_page(false);
        self
    }

    /// Skip the table of contents.
    pub fn without_table_of_contents(mut self) -> Self {
        self.options = self.options.with_table_of_contents(false);
        self
    }

    /// Set brand colours and cover texts.
    pub fn with_design(mut self, design: DesignSettings) -> Self {
        self.options = self.options.with_design(design);
        self
    }

    /// Fix the "generated on" timestamp for reproducible output.
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.options = self.options.with_generated_at(at);
        self
    }

    /// Override the slide layout constants.
    pub fn with_slide_layout(mut self, layout: SlideLayout) -> Self {
        self.options = self.options.with_slide_layout(layout);
        self
    }

    /// Get the options.
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export in the named format.
    pub fn export(&self, report: &Report, content: &Content, format: &str) -> ExportResult {
        export(report, content, format, &self.options)
    }

    /// Export a bundled document in the named format.
    pub fn export_document(&self, document: &Document, format: &str) -> ExportResult {
        export_document(document, format, &self.options)
    }

    /// Export a bundled document in every format.
    pub fn export_all(&self, document: &Document) -> Vec<(ExportFormat, ExportResult)> {
        let options = merge_design(&self.options, document.design.as_ref());
        ExportFormat::ALL
            .into_iter()
            .map(|format| {
                let result = export_as(&document.report, &document.content, format, &options);
                (format, result)
            })
            .collect()
    }
}
