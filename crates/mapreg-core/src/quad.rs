//! The registration frame: a rotatable rectangle in display pixel space.
//!
//! A [`Quadrilateral`] is where the geographic extent currently sits on
//! the image. Its parameters *are* the similarity transform's parameters,
//! so it never needs to be estimated, only manipulated.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GeographicExtent, Point};

/// One of the four frame corners.
///
/// The declaration order (TL, TR, BR, BL, clockwise from top-left) is the
/// order of [`Quadrilateral::corners`], which the solver and the backend
/// rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// All corners in contract order.
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    /// Position of this corner in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::TopLeft => 0,
            Self::TopRight => 1,
            Self::BottomRight => 2,
            Self::BottomLeft => 3,
        }
    }

    /// Signs of this corner's local-frame coordinates: `(-1, -1)` for
    /// top-left, `(1, 1)` for bottom-right.
    #[must_use]
    pub const fn signs(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (-1.0, -1.0),
            Self::TopRight => (1.0, -1.0),
            Self::BottomRight => (1.0, 1.0),
            Self::BottomLeft => (-1.0, 1.0),
        }
    }

    /// The diagonally opposite corner.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::BottomRight => Self::TopLeft,
            Self::BottomLeft => Self::TopRight,
        }
    }
}

/// The live registration frame.
///
/// Serialized with the field names used by the browser front end
/// (`centerX`, `rotationDegrees`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quadrilateral {
    /// Frame center, horizontal (display pixels).
    pub center_x: f64,
    /// Frame center, vertical (display pixels).
    pub center_y: f64,
    /// Unrotated width (display pixels).
    pub width: f64,
    /// Unrotated height (display pixels).
    pub height: f64,
    /// Clockwise rotation on screen. Any real value; see
    /// [`normalized_rotation`](Self::normalized_rotation) for display.
    pub rotation_degrees: f64,
}

impl Quadrilateral {
    /// Create a frame from its parameters.
    #[must_use]
    pub const fn new(
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
        rotation_degrees: f64,
    ) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
            rotation_degrees,
        }
    }

    /// Axis-aligned frame spanning a user-drawn rectangle.
    ///
    /// `a` and `b` may be any two opposite corners. Each side is grown
    /// symmetrically about the rectangle's center to at least `min_size`.
    #[must_use]
    pub fn from_corners(a: Point, b: Point, min_size: f64) -> Self {
        Self::new(
            f64::midpoint(a.x, b.x),
            f64::midpoint(a.y, b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
            0.0,
        )
        .clamped_to(min_size)
    }

    /// Frame centered on a display of size `display`, scaled uniformly so
    /// the extent's aspect ratio is preserved and the frame fills
    /// `fraction` of the limiting display dimension.
    #[must_use]
    pub fn fitted(
        extent: &GeographicExtent,
        display: Dimensions,
        fraction: f64,
        min_size: f64,
    ) -> Self {
        let dw = f64::from(display.width);
        let dh = f64::from(display.height);
        let scale = (dw * fraction / extent.width()).min(dh * fraction / extent.height());
        Self::new(
            dw / 2.0,
            dh / 2.0,
            extent.width() * scale,
            extent.height() * scale,
            0.0,
        )
        .clamped_to(min_size)
    }

    /// Copy with width and height raised to at least `min_size`.
    #[must_use]
    pub fn clamped_to(self, min_size: f64) -> Self {
        Self {
            width: self.width.max(min_size),
            height: self.height.max(min_size),
            ..self
        }
    }

    /// Frame center.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    /// Copy moved by `(dx, dy)`; size and rotation are unchanged.
    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            center_x: self.center_x + dx,
            center_y: self.center_y + dy,
            ..self
        }
    }

    /// Rotation mapped into `[0, 360)` for display.
    #[must_use]
    pub fn normalized_rotation(&self) -> f64 {
        let r = self.rotation_degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
        if r >= 360.0 { 0.0 } else { r }
    }

    /// Map a point from the frame's local (unrotated, center-origin)
    /// coordinates into display pixels.
    #[must_use]
    pub fn pixel_from_local(&self, local: Point) -> Point {
        let r = local.rotated(self.rotation_degrees);
        r.offset(self.center_x, self.center_y)
    }

    /// A single corner in display pixels.
    #[must_use]
    pub fn corner(&self, corner: Corner) -> Point {
        let (sx, sy) = corner.signs();
        self.pixel_from_local(Point::new(sx * self.width / 2.0, sy * self.height / 2.0))
    }

    /// The four corners in TL, TR, BR, BL order.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        Corner::ALL.map(|c| self.corner(c))
    }

    /// Rotation handle position: `offset` pixels beyond the top midpoint
    /// along the frame's local "up" axis.
    #[must_use]
    pub fn rotation_handle(&self, offset: f64) -> Point {
        self.pixel_from_local(Point::new(0.0, -self.height / 2.0 - offset))
    }

    /// Ray-casting point-in-polygon test against [`corners`](Self::corners).
    #[must_use]
    pub fn contains(&self, pixel: Point) -> bool {
        point_in_polygon(pixel, &self.corners())
    }
}

/// Even-odd ray casting along +X.
fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Whether `pixel` lies inside `quad`.
#[must_use]
pub fn point_in_quad(pixel: Point, quad: &Quadrilateral) -> bool {
    quad.contains(pixel)
}
