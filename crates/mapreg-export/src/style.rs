//! Stroke styling shared by the SVG and raster renderers.

use mapreg_core::RegionConfig;

/// How the projected boundary and the registration frame are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Boundary stroke color, RGB.
    pub color: [u8; 3],
    /// Boundary stroke width, in output pixels.
    pub line_width: f64,
    /// Frame outline color, RGB.
    pub frame_color: [u8; 3],
    /// Frame outline width, in output pixels.
    pub frame_width: f64,
}

impl OverlayStyle {
    pub const DEFAULT_COLOR: [u8; 3] = [255, 0, 0];
    pub const DEFAULT_LINE_WIDTH: f64 = 2.0;
    pub const DEFAULT_FRAME_COLOR: [u8; 3] = [255, 255, 0];
    pub const DEFAULT_FRAME_WIDTH: f64 = 2.0;

    /// Default style in the region's color.
    #[must_use]
    pub fn for_region(region: &RegionConfig) -> Self {
        Self {
            color: region.color,
            ..Self::default()
        }
    }

    /// `#rrggbb` for the boundary stroke.
    #[must_use]
    pub fn color_hex(&self) -> String {
        hex(self.color)
    }

    /// `#rrggbb` for the frame outline.
    #[must_use]
    pub fn frame_color_hex(&self) -> String {
        hex(self.frame_color)
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Self::DEFAULT_COLOR,
            line_width: Self::DEFAULT_LINE_WIDTH,
            frame_color: Self::DEFAULT_FRAME_COLOR,
            frame_width: Self::DEFAULT_FRAME_WIDTH,
        }
    }
}

fn hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
