//! OOXML package assembly shared by the DOCX, XLSX and PPTX renderers.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::model::Report;
use crate::text::escape_xml;

pub(crate) const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub(crate) const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub(crate) const REL_EXTENDED_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
pub(crate) const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_THEME: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub(crate) const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub(crate) const REL_CHART: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";

pub(crate) const CT_RELATIONSHIPS: &str =
    "application/vnd.openxmlformats-package.relationships+xml";
pub(crate) const CT_CORE_PROPERTIES: &str =
    "application/vnd.openxmlformats-package.core-properties+xml";
pub(crate) const CT_EXTENDED_PROPERTIES: &str =
    "application/vnd.openxmlformats-officedocument.extended-properties+xml";
pub(crate) const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
pub(crate) const CT_CHART: &str =
    "application/vnd.openxmlformats-officedocument.drawingml.chart+xml";

/// A zip archive being filled with package parts.
///
/// Entries carry a fixed timestamp so identical input yields identical bytes.
pub(crate) struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    content_types: ContentTypes,
}

impl Package {
    pub(crate) fn new() -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            content_types: ContentTypes::new(),
        }
    }

    /// Add a part, registering its content type as an override.
    pub(crate) fn add_part(
        &mut self,
        path: &str,
        content_type: &str,
        data: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.content_types.add_override(path, content_type);
        self.add_raw(path, data)
    }

    /// Add a part whose content type comes from its extension default.
    pub(crate) fn add_raw(&mut self, path: &str, data: impl AsRef<[u8]>) -> Result<()> {
        self.zip.start_file(path, self.options)?;
        self.zip.write_all(data.as_ref())?;
        Ok(())
    }

    /// Register a default content type for an extension.
    pub(crate) fn add_default(&mut self, extension: &str, content_type: &str) {
        self.content_types.add_default(extension, content_type);
    }

    /// Write `[Content_Types].xml` and the document properties, then close
    /// the archive.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>> {
        let content_types = self.content_types.to_xml();
        self.add_raw("[Content_Types].xml", content_types)?;
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Add the root relationships and the core/app property parts.
    pub(crate) fn add_package_metadata(
        &mut self,
        main_part: &str,
        report: &Report,
        created: &DateTime<Utc>,
        application: &str,
    ) -> Result<()> {
        let mut rels = Relationships::new();
        rels.add(REL_OFFICE_DOCUMENT, main_part);
        rels.add(REL_CORE_PROPERTIES, "docProps/core.xml");
        rels.add(REL_EXTENDED_PROPERTIES, "docProps/app.xml");
        self.add_raw("_rels/.rels", rels.to_xml())?;
        let core = core_properties_xml(report, created);
        self.add_part("docProps/core.xml", CT_CORE_PROPERTIES, core)?;
        self.add_part("docProps/app.xml", CT_EXTENDED_PROPERTIES, app_properties_xml(application))?;
        Ok(())
    }
}

/// `[Content_Types].xml` builder.
pub(crate) struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    fn new() -> Self {
        Self {
            defaults: vec![
                ("rels".to_string(), CT_RELATIONSHIPS.to_string()),
                ("xml".to_string(), "application/xml".to_string()),
            ],
            overrides: Vec::new(),
        }
    }

    fn add_default(&mut self, extension: &str, content_type: &str) {
        if !self.defaults.iter().any(|(ext, _)| ext == extension) {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    fn add_override(&mut self, path: &str, content_type: &str) {
        self.overrides
            .push((format!("/{}", path.trim_start_matches('/')), content_type.to_string()));
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        for (extension, content_type) in &self.defaults {
            let _ = write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                extension, content_type
            );
        }
        for (part, content_type) in &self.overrides {
            let _ = write!(
                xml,
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(part),
                content_type
            );
        }
        xml.push_str("</Types>");
        xml
    }
}

/// A `.rels` part builder handing out sequential `rIdN` identifiers.
#[derive(Debug, Default)]
pub(crate) struct Relationships {
    entries: Vec<(String, String, String, bool)>,
}

impl Relationships {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add an internal relationship and return its id.
    pub(crate) fn add(&mut self, rel_type: &str, target: &str) -> String {
        self.push(rel_type, target, false)
    }

    /// Add an external relationship (hyperlink) and return its id.
    pub(crate) fn add_external(&mut self, rel_type: &str, target: &str) -> String {
        self.push(rel_type, target, true)
    }

    fn push(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = format!("rId{}", self.entries.len() + 1);
        self.entries
            .push((id.clone(), rel_type.to_string(), target.to_string(), external));
        id
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, rel_type, target, external) in &self.entries {
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                id,
                rel_type,
                escape_xml(target),
                if *external { r#" TargetMode="External""# } else { "" }
            );
        }
        xml.push_str("</Relationships>");
        xml
    }
}

fn core_properties_xml(report: &Report, created: &DateTime<Utc>) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(concat!(
        r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
        r#" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/""#,
        r#" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#
    ));
    let _ = write!(xml, "<dc:title>{}</dc:title>", escape_xml(&report.title));
    if !report.description.is_empty() {
        let _ = write!(
            xml,
            "<dc:description>{}</dc:description>",
            escape_xml(&report.description)
        );
    }
    if !report.author.is_empty() {
        let _ = write!(xml, "<dc:creator>{}</dc:creator>", escape_xml(&report.author));
    }
    let _ = write!(xml, "<cp:revision>{}</cp:revision>", report.version);
    let stamp = created.format("%Y-%m-%dT%H:%M:%SZ");
    let _ = write!(
        xml,
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified>"#
    );
    xml.push_str("</cp:coreProperties>");
    xml
}

fn app_properties_xml(application: &str) -> String {
    format!(
        concat!(
            "{}",
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties""#,
            r#" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
            "<Application>{}</Application></Properties>"
        ),
        XML_DECLARATION,
        escape_xml(application)
    )
}

/// A minimal DrawingML theme; both Word and PowerPoint expect one.
pub(crate) fn theme_xml(primary: &str, secondary: &str, accent: &str) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Rapport"><a:themeElements>"#);
    let _ = write!(
        xml,
        concat!(
            r#"<a:clrScheme name="Rapport">"#,
            r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>"#,
            r#"<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
            r#"<a:dk2><a:srgbClr val="1E293B"/></a:dk2><a:lt2><a:srgbClr val="F1F5F9"/></a:lt2>"#,
            r#"<a:accent1><a:srgbClr val="{p}"/></a:accent1><a:accent2><a:srgbClr val="{a}"/></a:accent2>"#,
            r#"<a:accent3><a:srgbClr val="{s}"/></a:accent3><a:accent4><a:srgbClr val="10B981"/></a:accent4>"#,
            r#"<a:accent5><a:srgbClr val="F59E0B"/></a:accent5><a:accent6><a:srgbClr val="8B5CF6"/></a:accent6>"#,
            r#"<a:hlink><a:srgbClr val="2563EB"/></a:hlink><a:folHlink><a:srgbClr val="7C3AED"/></a:folHlink>"#,
            r#"</a:clrScheme>"#
        ),
        p = primary,
        a = accent,
        s = secondary
    );
    xml.push_str(concat!(
        r#"<a:fontScheme name="Rapport">"#,
        r#"<a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
        r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
        r#"</a:fontScheme>"#,
        r#"<a:fmtScheme name="Rapport"><a:fillStyleLst>"#,
        r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
        r#"</a:fillStyleLst><a:lnStyleLst>"#,
        r#"<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
        r#"</a:lnStyleLst><a:effectStyleLst>"#,
        r#"<a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle>"#,
        r#"</a:effectStyleLst><a:bgFillStyleLst>"#,
        r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
        r#"</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    ));
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;

    #[test]
    fn test_relationship_ids() {
        let mut rels = Relationships::new();
        assert_eq!(rels.add(REL_STYLES, "styles.xml"), "rId1");
        assert_eq!(rels.add_external("http://x/hyperlink", "https://a.b/?q=1&r=2"), "rId2");
        let xml = rels.to_xml();
        assert!(xml.contains(r#"Target="https://a.b/?q=1&amp;r=2" TargetMode="External""#));
    }

    #[test]
    fn test_package_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
        let report = Report::new("r1", "Bilan & perspectives", at);

        let mut package = Package::new();
        package
            .add_package_metadata("word/document.xml", &report, &at, "rapport")
            .unwrap();
        package.add_part("word/document.xml", "text/xml", "<doc/>").unwrap();
        let bytes = package.finish().unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut types = String::new();
        archive
            .by_name("[Content_Types].xml")
            .unwrap()
            .read_to_string(&mut types)
            .unwrap();
        assert!(types.contains(r#"<Override PartName="/word/document.xml" ContentType="text/xml"/>"#));

        let mut core = String::new();
        archive
            .by_name("docProps/core.xml")
            .unwrap()
            .read_to_string(&mut core)
            .unwrap();
        assert!(core.contains("<dc:title>Bilan &amp; perspectives</dc:title>"));
        assert!(core.contains("2024-04-02T00:00:00Z"));
    }

    #[test]
    fn test_package_is_deterministic() {
        let build = || {
            let mut package = Package::new();
            package.add_raw("a.xml", "<a/>").unwrap();
            package.finish().unwrap()
        };
        assert_eq!(build(), build());
    }
}
