//! Outbound registration results, in natural image pixels.
//!
//! The registration frame lives in display pixels (the scaled image the
//! user sees). Everything sent to the backend is rescaled to the image's
//! natural size first, then rounded to whole pixels.

use serde::{Deserialize, Serialize};

use crate::quad::Quadrilateral;
use crate::session::Region;
use crate::transform::Transform;
use crate::types::{Dimensions, GeographicExtent, Point, RegistrationError};

/// Four corners as whole natural pixels, TL, TR, BR, BL.
pub type Rect4 = [[i64; 2]; 4];

/// Natural versus on-screen size of the raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMapping {
    pub natural: Dimensions,
    pub display: Dimensions,
}

impl DisplayMapping {
    /// # Errors
    ///
    /// Returns [`RegistrationError::ImageNotReady`] if either size is zero.
    pub const fn new(natural: Dimensions, display: Dimensions) -> Result<Self, RegistrationError> {
        if natural.is_empty() || display.is_empty() {
            return Err(RegistrationError::ImageNotReady);
        }
        Ok(Self { natural, display })
    }

    /// Natural pixels per display pixel, per axis.
    #[must_use]
    pub fn scale(&self) -> (f64, f64) {
        (
            f64::from(self.natural.width) / f64::from(self.display.width),
            f64::from(self.natural.height) / f64::from(self.display.height),
        )
    }

    #[must_use]
    pub fn to_natural(&self, display: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(display.x * sx, display.y * sy)
    }

    /// Display-space corners rescaled and rounded to natural pixels.
    #[must_use]
    pub fn rect4(&self, corners: [Point; 4]) -> Rect4 {
        corners.map(|c| {
            let n = self.to_natural(c);
            [round_px(n.x), round_px(n.y)]
        })
    }
}

// Pixel coordinates are far inside i64 range; `as` saturates otherwise.
#[allow(clippy::cast_possible_truncation)]
fn round_px(v: f64) -> i64 {
    v.round() as i64
}

/// Result of similarity registration: the frame's corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectDescriptor {
    pub rect4: Rect4,
}

impl RectDescriptor {
    #[must_use]
    pub fn from_quad(quad: &Quadrilateral, mapping: &DisplayMapping) -> Self {
        Self {
            rect4: mapping.rect4(quad.corners()),
        }
    }
}

/// Result of homography registration: the extent's corners projected
/// through the solved transform, with the extent they came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyRectDescriptor {
    pub rect4: Rect4,
    pub bounds: GeographicExtent,
}

impl LegacyRectDescriptor {
    /// # Errors
    ///
    /// Returns [`RegistrationError::UndefinedProjection`] if an extent
    /// corner has no image under `transform`.
    pub fn from_transform(
        transform: &Transform,
        extent: &GeographicExtent,
        mapping: &DisplayMapping,
    ) -> Result<Self, RegistrationError> {
        let [a, b, c, d] = extent.corners();
        let corners = [
            transform.project_point(a)?,
            transform.project_point(b)?,
            transform.project_point(c)?,
            transform.project_point(d)?,
        ];
        Ok(Self {
            rect4: mapping.rect4(corners),
            bounds: *extent,
        })
    }
}

/// Image size as stored in a [`BoundsDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl From<Dimensions> for ImageSize {
    fn from(d: Dimensions) -> Self {
        Self {
            width: d.width,
            height: d.height,
        }
    }
}

/// One region's frame inside a [`BoundsDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasRect4 {
    pub name: Region,
    pub rect4: Rect4,
}

/// Multi-region bounds document as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub image_size: ImageSize,
    pub canvases: Vec<CanvasRect4>,
}

impl BoundsDocument {
    pub const KIND: &'static str = "map_canvas_bounds";

    /// Empty document for an image of natural size `image_size`.
    #[must_use]
    pub fn new(image_size: Dimensions) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            image_size: image_size.into(),
            canvases: Vec::new(),
        }
    }

    /// Set `region`'s frame, replacing any earlier one.
    pub fn upsert(&mut self, name: Region, rect4: Rect4) {
        match self.canvases.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.rect4 = rect4,
            None => self.canvases.push(CanvasRect4 { name, rect4 }),
        }
    }

    #[must_use]
    pub fn canvas(&self, name: Region) -> Option<&CanvasRect4> {
        self.canvases.iter().find(|c| c.name == name)
    }
}
