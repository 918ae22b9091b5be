//! Transform primitives: geographic space to display pixel space.
//!
//! Two kinds of transform are supported:
//!
//! - [`SimilarityTransform`]: translate + rotate + per-axis scale, derived
//!   in closed form from a [`Quadrilateral`]. Always defined.
//! - [`ProjectiveTransform`]: an 8-DOF homography solved from four point
//!   correspondences. Points on the homography's line at infinity have no
//!   image; projecting them is an error, never a silent `(0, 0)`.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::quad::Quadrilateral;
use crate::types::{GeographicExtent, Point, RegistrationError};

/// Homogeneous scale magnitude below which a projection is undefined.
pub const EPS: f64 = 1e-10;

/// Translate + rotate + scale from geographic to display pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityTransform {
    /// Pixel position the extent center maps to.
    pub center_x: f64,
    pub center_y: f64,
    /// Pixels per geographic unit along the frame's local X axis.
    pub scale_x: f64,
    /// Pixels per geographic unit along the frame's local Y axis.
    pub scale_y: f64,
    /// Clockwise on-screen rotation.
    pub rotation_degrees: f64,
    /// Geographic point that maps to the center (the extent center).
    pub origin: Point,
}

impl SimilarityTransform {
    /// Project a geographic point into display pixels.
    ///
    /// The point is taken relative to [`origin`](Self::origin), its Y
    /// axis is flipped (north-up to screen-down), scaled in the frame's
    /// local axes, rotated, and translated to the center. Scaling before
    /// rotating keeps the extent's corners on the frame's corners for any
    /// aspect ratio.
    #[must_use]
    pub fn project(&self, geo: Point) -> Point {
        let local = Point::new(
            (geo.x - self.origin.x) * self.scale_x,
            -(geo.y - self.origin.y) * self.scale_y,
        );
        local
            .rotated(self.rotation_degrees)
            .offset(self.center_x, self.center_y)
    }

    /// Exact inverse of [`project`](Self::project).
    #[must_use]
    pub fn unproject(&self, pixel: Point) -> Point {
        let local = pixel
            .offset(-self.center_x, -self.center_y)
            .rotated(-self.rotation_degrees);
        Point::new(
            self.origin.x + local.x / self.scale_x,
            self.origin.y - local.y / self.scale_y,
        )
    }

    /// The same mapping as a 3x3 matrix with an affine bottom row.
    #[must_use]
    pub fn to_projective(&self) -> ProjectiveTransform {
        let (s, c) = self.rotation_degrees.to_radians().sin_cos();
        let (sx, sy) = (self.scale_x, self.scale_y);
        let (ox, oy) = (self.origin.x, self.origin.y);
        ProjectiveTransform {
            matrix: [
                [
                    sx * c,
                    sy * s,
                    self.center_x - sx * c * ox - sy * s * oy,
                ],
                [
                    sx * s,
                    -sy * c,
                    self.center_y - sx * s * ox + sy * c * oy,
                ],
                [0.0, 0.0, 1.0],
            ],
        }
    }
}

/// A homography, normalized so `matrix[2][2] == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProjective")]
pub struct ProjectiveTransform {
    matrix: [[f64; 3]; 3],
}

#[derive(Deserialize)]
struct RawProjective {
    matrix: [[f64; 3]; 3],
}

impl TryFrom<RawProjective> for ProjectiveTransform {
    type Error = RegistrationError;

    fn try_from(raw: RawProjective) -> Result<Self, Self::Error> {
        Self::from_matrix(raw.matrix)
    }
}

impl ProjectiveTransform {
    /// Normalize a homography defined up to scale.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DegenerateCorrespondence`] when
    /// `|matrix[2][2]| < EPS` or any entry is non-finite, since such a
    /// matrix cannot be brought into the normalized form.
    pub fn from_matrix(matrix: [[f64; 3]; 3]) -> Result<Self, RegistrationError> {
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(RegistrationError::DegenerateCorrespondence(
                "homography has non-finite entries".to_string(),
            ));
        }
        let h22 = matrix[2][2];
        if h22.abs() < EPS {
            return Err(RegistrationError::DegenerateCorrespondence(format!(
                "normalization denominator {h22:e} is too close to zero"
            )));
        }
        Ok(Self {
            matrix: matrix.map(|row| row.map(|v| v / h22)),
        })
    }

    /// The normalized matrix, row-major.
    #[must_use]
    pub const fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    /// The matrix as an `nalgebra` type.
    #[must_use]
    pub fn to_matrix3(&self) -> Matrix3<f64> {
        let m = &self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    /// Project a point through the homography.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UndefinedProjection`] when the
    /// homogeneous scale `w` satisfies `|w| < EPS`.
    pub fn project(&self, p: Point) -> Result<Point, RegistrationError> {
        let h = &self.matrix;
        let w = h[2][0].mul_add(p.x, h[2][1].mul_add(p.y, h[2][2]));
        if w.abs() < EPS || !w.is_finite() {
            return Err(RegistrationError::UndefinedProjection { x: p.x, y: p.y });
        }
        let x = h[0][0].mul_add(p.x, h[0][1].mul_add(p.y, h[0][2]));
        let y = h[1][0].mul_add(p.x, h[1][1].mul_add(p.y, h[1][2]));
        Ok(Point::new(x / w, y / w))
    }

    /// The inverse homography, or `None` if the matrix is singular or the
    /// inverse cannot be normalized.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.to_matrix3().try_inverse()?;
        let rows = [
            [inv[(0, 0)], inv[(0, 1)], inv[(0, 2)]],
            [inv[(1, 0)], inv[(1, 1)], inv[(1, 2)]],
            [inv[(2, 0)], inv[(2, 1)], inv[(2, 2)]],
        ];
        Self::from_matrix(rows).ok()
    }
}

/// The current geographic-to-pixel mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Similarity(SimilarityTransform),
    Projective(ProjectiveTransform),
}

impl Transform {
    /// Project a geographic point into display pixels.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UndefinedProjection`] for projective
    /// transforms when the point has no image. Similarity transforms
    /// never fail.
    pub fn project_point(&self, geo: Point) -> Result<Point, RegistrationError> {
        match self {
            Self::Similarity(t) => Ok(t.project(geo)),
            Self::Projective(t) => t.project(geo),
        }
    }

    /// Map a display pixel back into geographic coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UndefinedProjection`] when a
    /// projective transform is singular or the pixel has no preimage.
    pub fn pixel_to_geographic(&self, pixel: Point) -> Result<Point, RegistrationError> {
        match self {
            Self::Similarity(t) => Ok(t.unproject(pixel)),
            Self::Projective(t) => t
                .inverse()
                .ok_or(RegistrationError::UndefinedProjection {
                    x: pixel.x,
                    y: pixel.y,
                })?
                .project(pixel),
        }
    }

    /// The transform as a homography matrix.
    #[must_use]
    pub fn to_projective(&self) -> ProjectiveTransform {
        match self {
            Self::Similarity(t) => t.to_projective(),
            Self::Projective(t) => *t,
        }
    }
}

/// Closed-form similarity transform whose image of `extent` is exactly
/// `quad`.
///
/// Division is only by the extent's dimensions, which
/// [`GeographicExtent`] guarantees to be positive.
#[must_use]
pub fn similarity_from_quad(quad: &Quadrilateral, extent: &GeographicExtent) -> SimilarityTransform {
    SimilarityTransform {
        center_x: quad.center_x,
        center_y: quad.center_y,
        scale_x: quad.width / extent.width(),
        scale_y: quad.height / extent.height(),
        rotation_degrees: quad.rotation_degrees,
        origin: extent.center(),
    }
}

/// Map a display pixel into `quad`'s local frame: relative to its center,
/// rotated by `-rotation_degrees`.
///
/// Exact inverse of [`Quadrilateral::pixel_from_local`].
#[must_use]
pub fn local_from_pixel(pixel: Point, quad: &Quadrilateral) -> Point {
    pixel
        .offset(-quad.center_x, -quad.center_y)
        .rotated(-quad.rotation_degrees)
}
