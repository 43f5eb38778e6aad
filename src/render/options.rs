//! Export options and layout configuration.

use crate::layout::{MarginProfile, Orientation, PageGeometry, PageSize};
use crate::model::{DesignSettings, Theme};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options for exporting a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Paper size for page-based formats
    pub page_size: PageSize,

    /// Margin profile for page-based formats
    pub margins: MarginProfile,

    /// Page orientation
    pub orientation: Orientation,

    /// Emit a cover page (or cover slide)
    pub include_cover_page: bool,

    /// Emit a table of contents
    pub include_table_of_contents: bool,

    /// Timestamp printed as "generated on"; the current time when unset
    pub generated_at: Option<DateTime<Utc>>,

    /// Per-report design override
    pub design: Option<DesignSettings>,

    /// Slide deck layout constants
    pub slide_layout: SlideLayout,
}

impl ExportOptions {
    /// Create new export options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the paper size.
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the margin profile.
    pub fn with_margins(mut self, margins: MarginProfile) -> Self {
        self.margins = margins;
        self
    }

    /// Set the orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Enable or disable the cover page.
    pub fn with_cover_page(mut self, include: bool) -> Self {
        self.include_cover_page = include;
        self
    }

    /// Enable or disable the table of contents.
    pub fn with_table_of_contents(mut self, include: bool) -> Self {
        self.include_table_of_contents = include;
        self
    }

    /// Pin the "generated on" timestamp for reproducible output.
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Set the design override.
    pub fn with_design(mut self, design: DesignSettings) -> Self {
        self.design = Some(design);
        self
    }

    /// Set the slide layout constants.
    pub fn with_slide_layout(mut self, layout: SlideLayout) -> Self {
        self.slide_layout = layout;
        self
    }

    /// Page geometry resolved from the layout tables.
    pub fn page_geometry(&self) -> PageGeometry {
        PageGeometry::resolve(self.page_size, self.orientation, self.margins)
    }

    /// Design settings with every fallback applied.
    pub fn theme(&self) -> Theme {
        Theme::resolve(self.design.as_ref())
    }

    /// The "generated on" timestamp.
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at.unwrap_or_else(Utc::now)
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margins: MarginProfile::Normal,
            orientation: Orientation::Portrait,
            include_cover_page: true,
            include_table_of_contents: true,
            generated_at: None,
            design: None,
            slide_layout: SlideLayout::default(),
        }
    }
}

/// Slide deck layout constants, in inches of a 16:9 slide.
///
/// The per-block heights and the block cap are empirical values; they are
/// kept as plain fields so callers can tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlideLayout {
    /// Slide width
    pub slide_width: f64,
    /// Slide height
    pub slide_height: f64,
    /// Horizontal margin
    pub margin_x: f64,
    /// Cursor start below the title band
    pub content_top: f64,
    /// Lowest cursor position content may reach
    pub content_bottom: f64,
    /// Blocks placed on one slide before a continuation slide opens
    pub max_blocks_per_slide: usize,
    /// Table rows shown before the summary row
    pub max_table_rows: usize,
    /// Paragraph height
    pub paragraph: f64,
    /// Heading height
    pub heading: f64,
    /// Height per list item
    pub list_item: f64,
    /// Height per table row
    pub table_row: f64,
    /// Extra table padding
    pub table_padding: f64,
    /// Row count cap used in the table height estimate
    pub table_rows_cap: usize,
    /// Chart height
    pub chart: f64,
    /// Cursor advance of a chart placeholder
    pub chart_placeholder: f64,
    /// KPI card height
    pub kpi_card: f64,
    /// Callout height
    pub callout: f64,
    /// Quote height without attribution
    pub quote: f64,
    /// Quote height with attribution
    pub quote_with_author: f64,
    /// Divider height
    pub divider: f64,
    /// Image height
    pub image: f64,
}

impl SlideLayout {
    /// Width available between the horizontal margins.
    pub fn content_width(&self) -> f64 {
        self.slide_width - 2.0 * self.margin_x
    }
}

impl Default for SlideLayout {
    fn default() -> Self {
        Self {
            slide_width: 10.0,
            slide_height: 5.625,
            margin_x: 0.5,
            content_top: 1.25,
            content_bottom: 5.3,
            max_blocks_per_slide: 5,
            max_table_rows: 8,
            paragraph: 0.6,
            heading: 0.8,
            list_item: 0.35,
            table_row: 0.35,
            table_padding: 0.3,
            table_rows_cap: 10,
            chart: 2.8,
            chart_placeholder: 0.8,
            kpi_card: 1.4,
            callout: 1.0,
            quote: 0.7,
            quote_with_author: 0.9,
            divider: 0.4,
            image: 2.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_options_builder() {
        let options = ExportOptions::new()
            .with_page_size(PageSize::Letter)
            .with_orientation(Orientation::Landscape)
            .with_cover_page(false);

        assert_eq!(options.page_size, PageSize::Letter);
        assert!(!options.include_cover_page);
        assert!(options.include_table_of_contents);
        let geometry = options.page_geometry();
        assert!(geometry.width > geometry.height);
    }

    #[test]
    fn test_export_options_deserialize_partial() {
        let options: ExportOptions = serde_json::from_str(
            r#"{"pageSize":"A3","margins":"narrow","includeTableOfContents":false}"#,
        )
        .unwrap();
        assert_eq!(options.page_size, PageSize::A3);
        assert_eq!(options.margins, MarginProfile::Narrow);
        assert!(!options.include_table_of_contents);
        assert_eq!(options.slide_layout.max_blocks_per_slide, 5);
    }

    #[test]
    fn test_slide_layout_override() {
        let layout: SlideLayout = serde_json::from_str(r#"{"maxBlocksPerSlide":3}"#).unwrap();
        assert_eq!(layout.max_blocks_per_slide, 3);
        assert_eq!(layout.chart, 2.8);
        assert_eq!(layout.content_width(), 9.0);
    }
}
