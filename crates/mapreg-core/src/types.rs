//! Shared types for the mapreg registration engine.

use serde::{Deserialize, Serialize};

/// A 2D point.
///
/// Used for geographic coordinates (native units of the boundary data,
/// Y increasing northward) as well as pixel coordinates (Y increasing
/// downward). Which space a point lives in is determined by context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Rotate this point about the origin by `degrees`.
    ///
    /// In pixel space (Y down) a positive angle turns clockwise on screen.
    #[must_use]
    pub fn rotated(self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            x: self.x.mul_add(cos, -(self.y * sin)),
            y: self.x.mul_add(sin, self.y * cos),
        }
    }

    /// Component-wise sum.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero.
    ///
    /// A browser image element reports `0x0` natural dimensions until
    /// decoding finishes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned bounding box of the source vector data, in its native
/// geographic units.
///
/// Always satisfies `xmax > xmin` and `ymax > ymin` with finite values;
/// the constructor and deserializer reject anything else with
/// [`RegistrationError::InvalidExtent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExtent")]
pub struct GeographicExtent {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

/// Unvalidated wire form of [`GeographicExtent`].
#[derive(Deserialize)]
struct RawExtent {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl TryFrom<RawExtent> for GeographicExtent {
    type Error = RegistrationError;

    fn try_from(raw: RawExtent) -> Result<Self, Self::Error> {
        Self::new(raw.xmin, raw.xmax, raw.ymin, raw.ymax)
    }
}

impl GeographicExtent {
    /// Create a validated extent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidExtent`] if any bound is
    /// non-finite or the extent has zero or negative width or height.
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, RegistrationError> {
        let finite = [xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite());
        if !finite || xmax <= xmin || ymax <= ymin {
            return Err(RegistrationError::InvalidExtent {
                xmin,
                xmax,
                ymin,
                ymax,
            });
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    #[must_use]
    pub const fn xmin(&self) -> f64 {
        self.xmin
    }

    #[must_use]
    pub const fn xmax(&self) -> f64 {
        self.xmax
    }

    #[must_use]
    pub const fn ymin(&self) -> f64 {
        self.ymin
    }

    #[must_use]
    pub const fn ymax(&self) -> f64 {
        self.ymax
    }

    /// Extent width (`xmax - xmin`), always positive.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Extent height (`ymax - ymin`), always positive.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }

    /// Center of the extent.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            f64::midpoint(self.xmin, self.xmax),
            f64::midpoint(self.ymin, self.ymax),
        )
    }

    /// The four corners in TL, TR, BR, BL order, where "top" is north
    /// (the larger Y value).
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.xmin, self.ymax),
            Point::new(self.xmax, self.ymax),
            Point::new(self.xmax, self.ymin),
            Point::new(self.xmin, self.ymin),
        ]
    }
}

/// Errors produced by the registration engine.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The geographic extent has zero, negative, or non-finite size.
    #[error(
        "invalid geographic extent: x [{xmin}, {xmax}], y [{ymin}, {ymax}] must have positive finite width and height"
    )]
    InvalidExtent {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },

    /// The four correspondences do not determine a unique homography.
    #[error("degenerate correspondences ({0}); try different points")]
    DegenerateCorrespondence(String),

    /// A point has no image under the projective transform.
    #[error("point ({x}, {y}) has no defined projection")]
    UndefinedProjection { x: f64, y: f64 },

    /// A homography was requested before all four pairs were collected.
    #[error("need 4 correspondences to solve, have {have}")]
    IncompleteCorrespondences { have: usize },

    /// A fifth correspondence was pushed onto a frozen set.
    #[error("correspondence set already holds 4 pairs; undo one first")]
    CorrespondenceSetFull,

    /// A stored correspondence does not sit at its collection step.
    #[error("correspondence at position {position} claims step {step}")]
    CorrespondenceOutOfOrder { position: usize, step: usize },

    /// The raster image has not reported its dimensions yet.
    #[error("image dimensions are not known yet")]
    ImageNotReady,

    /// The inbound boundary document is not valid JSON of the expected shape.
    #[error("failed to parse boundary document: {0}")]
    BoundaryParse(#[from] serde_json::Error),

    /// Registration configuration is invalid.
    #[error("invalid registration configuration: {0}")]
    InvalidConfig(String),
}
