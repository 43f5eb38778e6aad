//! Layout metrics tables: paper sizes and margin profiles.
//!
//! All lengths are millimetres. The two page-based renderers (PDF and DOCX)
//! resolve their geometry here and convert to their native unit with the
//! helpers at the bottom of this module.

use serde::{Deserialize, Serialize};

/// Paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// ISO A4 (210 × 297 mm)
    #[default]
    A4,
    /// ISO A3 (297 × 420 mm)
    A3,
    /// US Letter (8.5 × 11 in)
    Letter,
}

impl PageSize {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::A3 => (297.0, 420.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide
    #[default]
    Portrait,
    /// Wider than tall
    Landscape,
}

/// Named margin profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginProfile {
    /// 20 mm on every side
    #[default]
    Normal,
    /// 12.7 mm on every side
    Narrow,
    /// 25.4 mm top/bottom, 50.8 mm left/right
    Wide,
}

impl MarginProfile {
    /// Margins of this profile.
    pub fn margins(self) -> Margins {
        match self {
            MarginProfile::Normal => Margins::uniform(20.0),
            MarginProfile::Narrow => Margins::uniform(12.7),
            MarginProfile::Wide => Margins {
                top: 25.4,
                right: 50.8,
                bottom: 25.4,
                left: 50.8,
            },
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    /// Top margin
    pub top: f32,
    /// Right margin
    pub right: f32,
    /// Bottom margin
    pub bottom: f32,
    /// Left margin
    pub left: f32,
}

impl Margins {
    /// Same margin on every side.
    pub const fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

/// Resolved page geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Margins
    pub margins: Margins,
}

impl PageGeometry {
    /// Resolve geometry from the layout tables.
    pub fn resolve(size: PageSize, orientation: Orientation, margins: MarginProfile) -> Self {
        let (w, h) = size.dimensions_mm();
        let (width, height) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        Self {
            width,
            height,
            margins: margins.margins(),
        }
    }

    /// Width available between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.width - self.margins.left - self.margins.right
    }

    /// Height available between the top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.height - self.margins.top - self.margins.bottom
    }

    /// Lowest cursor position content may reach.
    pub fn content_bottom(&self) -> f32 {
        self.height - self.margins.bottom
    }
}

/// Millimetres to PDF points.
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

/// Millimetres to Word twentieths of a point.
pub fn mm_to_twips(mm: f32) -> u32 {
    (mm * 1440.0 / 25.4).round().max(0.0) as u32
}

/// EMUs per inch, the DrawingML base unit.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// Inches to EMUs.
pub fn in_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}
