//! Error types for the rapport export engine.

use std::io;
use thiserror::Error;

/// Result type alias for rapport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while exporting a report.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested export format is not one of the supported identifiers.
    #[error("Format non supporté: {0}")]
    UnsupportedFormat(String),

    /// Failure during tree traversal or layout computation.
    #[error("{0}")]
    Render(String),

    /// A chart or image could not be embedded natively.
    ///
    /// Recovered inside the slide deck renderer, never returned by `export`.
    #[error("Embedding failure: {0}")]
    Embedding(String),

    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error while assembling an OOXML archive.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error while building the PDF object graph.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl Error {
    /// Shorthand for a [`Error::Render`] with a formatted message.
    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedFormat("xml".to_string());
        assert_eq!(err.to_string(), "Format non supporté: xml");

        let err = Error::render("Tableau sans en-têtes");
        assert_eq!(err.to_string(), "Tableau sans en-têtes");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
