//! Report-level types.

use super::{Content, DesignSettings};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Being written
    #[default]
    Draft,
    /// Awaiting validation
    Review,
    /// Published
    Published,
    /// No longer current
    Archived,
}

impl ReportStatus {
    /// French display label.
    pub fn label(self) -> &'static str {
        match self {
            ReportStatus::Draft => "Brouillon",
            ReportStatus::Review => "En revue",
            ReportStatus::Published => "Publié",
            ReportStatus::Archived => "Archivé",
        }
    }
}

/// Report metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Stable identifier
    pub id: String,

    /// Report title
    pub title: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Author name
    #[serde(default)]
    pub author: String,

    /// Reporting period (e.g. "T1 2024")
    #[serde(default)]
    pub period_label: String,

    /// Publication status
    #[serde(default)]
    pub status: ReportStatus,

    /// Version number
    #[serde(default = "default_version")]
    pub version: u32,

    /// Creation date
    pub created_at: DateTime<Utc>,

    /// Last modification date
    pub updated_at: DateTime<Utc>,

    /// Publication date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    1
}

impl Report {
    /// Create a draft report dated at `at`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            author: String::new(),
            period_label: String::new(),
            status: ReportStatus::Draft,
            version: 1,
            created_at: at,
            updated_at: at,
            published_at: None,
        }
    }

    /// Set the author and return self.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the period label and return self.
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period_label = period.into();
        self
    }

    /// Set the description and return self.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Metadata as ordered label/value pairs, skipping empty fields.
    ///
    /// Used by every renderer that prints a metadata summary.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![("Titre", self.title.clone())];
        if !self.description.is_empty() {
            rows.push(("Description", self.description.clone()));
        }
        if !self.author.is_empty() {
            rows.push(("Auteur", self.author.clone()));
        }
        if !self.period_label.is_empty() {
            rows.push(("Période", self.period_label.clone()));
        }
        rows.push(("Statut", self.status.label().to_string()));
        rows.push(("Version", self.version.to_string()));
        rows.push(("Créé le", format_date(&self.created_at)));
        rows.push(("Mis à jour le", format_date(&self.updated_at)));
        if let Some(ref published) = self.published_at {
            rows.push(("Publié le", format_date(published)));
        }
        rows
    }
}

/// Format a timestamp as `dd/mm/yyyy`.
pub(crate) fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

/// A complete exportable document: metadata, content tree and optional design.
///
/// This is the shape of the JSON files the command-line tool reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Report metadata
    pub report: Report,

    /// Section tree
    pub content: Content,

    /// Design override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignSettings>,
}

impl Document {
    /// Bundle a report and its content.
    pub fn new(report: Report, content: Content) -> Self {
        Self {
            report,
            content,
            design: None,
        }
    }

    /// Parse a document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the document to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_summary_rows_skip_empty() {
        let report = Report::new("r1", "Bilan", at()).with_author("Direction financière");
        let rows = report.summary_rows();
        let labels: Vec<_> = rows.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec!["Titre", "Auteur", "Statut", "Version", "Créé le", "Mis à jour le"]
        );
        assert_eq!(rows[4].1, "02/04/2024");
    }

    #[test]
    fn test_document_json() {
        let json = r##"{
            "report": {
                "id": "r1", "title": "Bilan T1", "periodLabel": "T1 2024",
                "status": "published", "version": 3,
                "createdAt": "2024-04-02T09:30:00Z", "updatedAt": "2024-04-03T09:30:00Z"
            },
            "content": { "sections": [ { "id": "s1", "title": "Synthèse", "level": 1,
                "blocks": [ { "type": "paragraph", "content": "Bonjour" } ] } ] },
            "design": { "primaryColor": "#112233" }
        }"##;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.report.status, ReportStatus::Published);
        assert_eq!(doc.report.period_label, "T1 2024");
        assert_eq!(doc.content.sections[0].blocks.len(), 1);
        assert_eq!(
            doc.design.and_then(|d| d.primary_color).as_deref(),
            Some("#112233")
        );
    }
}
