//! Per-report design settings and the resolved theme renderers consume.

use serde::{Deserialize, Serialize};

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Rgb {
    /// Primary colour used when the design settings carry none or a malformed one.
    pub const FALLBACK_PRIMARY: Rgb = Rgb::new(30, 58, 138);
    /// Secondary fallback.
    pub const FALLBACK_SECONDARY: Rgb = Rgb::new(100, 116, 139);
    /// Accent fallback.
    pub const FALLBACK_ACCENT: Rgb = Rgb::new(14, 165, 233);
    /// White.
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    /// Body text colour.
    pub const TEXT: Rgb = Rgb::new(30, 41, 59);
    /// Muted text colour.
    pub const MUTED: Rgb = Rgb::new(100, 116, 139);
    /// Zebra shading for table rows.
    pub const ZEBRA: Rgb = Rgb::new(241, 245, 249);

    /// Create a colour.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`, `RRGGBB` or `#RGB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Some(Self::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        }
    }

    /// Parse a hex string, falling back on malformed or missing input.
    pub fn parse_or(hex: Option<&str>, fallback: Rgb) -> Self {
        match hex {
            Some(value) => Self::from_hex(value).unwrap_or_else(|| {
                log::warn!("Invalid colour {:?}, using fallback", value);
                fallback
            }),
            None => fallback,
        }
    }

    /// Upper-case `RRGGBB` without the leading `#` (OOXML form).
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// CSS form `#rrggbb`.
    pub fn to_css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels as 0..1 floats (PDF colour operands).
    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }

    /// Blend towards white by `amount` (0 = unchanged, 1 = white).
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let mix = |c: u8| (f32::from(c) + (255.0 - f32::from(c)) * amount).round() as u8;
        Self::new(mix(self.r), mix(self.g), mix(self.b))
    }
}

/// Per-report design override, as authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSettings {
    /// Primary brand colour (hex)
    #[serde(default)]
    pub primary_color: Option<String>,

    /// Secondary brand colour (hex)
    #[serde(default)]
    pub secondary_color: Option<String>,

    /// Accent colour (hex)
    #[serde(default)]
    pub accent_color: Option<String>,

    /// Base body font size in points
    #[serde(default)]
    pub base_font_size: Option<f32>,

    /// Cover page title replacing the report title
    #[serde(default)]
    pub cover_title: Option<String>,

    /// Cover page subtitle
    #[serde(default)]
    pub cover_subtitle: Option<String>,

    /// Branding string stamped in page footers
    #[serde(default)]
    pub footer_text: Option<String>,
}

impl DesignSettings {
    /// Create empty design settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary colour.
    pub fn with_primary_color(mut self, hex: impl Into<String>) -> Self {
        self.primary_color = Some(hex.into());
        self
    }

    /// Set the footer branding string.
    pub fn with_footer_text(mut self, text: impl Into<String>) -> Self {
        self.footer_text = Some(text.into());
        self
    }

    /// Set the base font size.
    pub fn with_base_font_size(mut self, size: f32) -> Self {
        self.base_font_size = Some(size);
        self
    }
}

/// Resolved design values with every fallback applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Primary brand colour
    pub primary: Rgb,
    /// Secondary brand colour
    pub secondary: Rgb,
    /// Accent colour
    pub accent: Rgb,
    /// Body font size in points
    pub base_font_size: f32,
    /// Cover title override
    pub cover_title: Option<String>,
    /// Cover subtitle
    pub cover_subtitle: Option<String>,
    /// Footer branding
    pub footer_text: Option<String>,
}

impl Theme {
    /// Smallest and largest accepted body font size.
    const FONT_RANGE: (f32, f32) = (7.0, 16.0);

    /// Resolve optional design settings into a theme.
    pub fn resolve(design: Option<&DesignSettings>) -> Self {
        let Some(design) = design else {
            return Self::default();
        };
        let base_font_size = design
            .base_font_size
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(Self::FONT_RANGE.0, Self::FONT_RANGE.1))
            .unwrap_or(10.0);

        Self {
            primary: Rgb::parse_or(design.primary_color.as_deref(), Rgb::FALLBACK_PRIMARY),
            secondary: Rgb::parse_or(design.secondary_color.as_deref(), Rgb::FALLBACK_SECONDARY),
            accent: Rgb::parse_or(design.accent_color.as_deref(), Rgb::FALLBACK_ACCENT),
            base_font_size,
            cover_title: design.cover_title.clone(),
            cover_subtitle: design.cover_subtitle.clone(),
            footer_text: design.footer_text.clone(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Rgb::FALLBACK_PRIMARY,
            secondary: Rgb::FALLBACK_SECONDARY,
            accent: Rgb::FALLBACK_ACCENT,
            base_font_size: 10.0,
            cover_title: None,
            cover_subtitle: None,
            footer_text: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_hex() {
        assert_eq!(Rgb::from_hex("#FF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::from_hex("0a0b0c"), Some(Rgb::new(10, 11, 12)));
        assert_eq!(Rgb::from_hex("#fff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::from_hex("#GG0000"), None);
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#ééé"), None);
    }

    #[test]
    fn test_theme_fallbacks() {
        let design = DesignSettings::new()
            .with_primary_color("not-a-colour")
            .with_base_font_size(40.0);
        let theme = Theme::resolve(Some(&design));
        assert_eq!(theme.primary, Rgb::FALLBACK_PRIMARY);
        assert_eq!(theme.base_font_size, 16.0);

        let theme = Theme::resolve(Some(&DesignSettings::new().with_primary_color("#102030")));
        assert_eq!(theme.primary, Rgb::new(16, 32, 48));
        assert_eq!(theme.primary.to_hex(), "102030");
        assert_eq!(theme.primary.to_css(), "#102030");
    }

    #[test]
    fn test_lighten() {
        assert_eq!(Rgb::new(0, 0, 0).lighten(1.0), Rgb::WHITE);
        assert_eq!(Rgb::new(100, 100, 100).lighten(0.0), Rgb::new(100, 100, 100));
    }
}
