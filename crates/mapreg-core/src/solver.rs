//! Registration solver: turn user constraints into a [`Transform`].
//!
//! - **Similarity mode** has no estimation step. The registration frame's
//!   parameters are the transform's parameters, so the extent's corners
//!   land exactly on the frame's corners.
//! - **Projective mode** solves the 8-DOF homography from exactly four
//!   correspondences with the direct linear transform (DLT). Four pairs in
//!   general position give an exact linear system whose coefficient matrix
//!   has a one-dimensional null space, taken from the SVD.
//!
//! [`Transform`]: crate::transform::Transform

use std::array;

use nalgebra::{Matrix3, SMatrix};
use serde::Serialize;

use crate::correspondence::{CorrespondenceSet, REQUIRED_PAIRS};
use crate::quad::Quadrilateral;
use crate::transform::{EPS, ProjectiveTransform, SimilarityTransform, similarity_from_quad};
use crate::types::{GeographicExtent, Point, RegistrationError};

/// Similarity-mode solve: the closed-form transform for `quad`.
#[must_use]
pub fn solve_similarity(quad: &Quadrilateral, extent: &GeographicExtent) -> SimilarityTransform {
    similarity_from_quad(quad, extent)
}

/// A solved homography and how well it reproduces its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomographySolution {
    pub transform: ProjectiveTransform,
    /// Largest distance (pixels) between a projected geographic point and
    /// the pixel it was paired with. Four exact pairs should reproduce to
    /// floating-point precision.
    pub max_residual_px: f64,
}

/// Projective-mode solve from a frozen four-pair set.
///
/// Points are Hartley-normalized (centroid at the origin, mean distance
/// √2) before building the 8x9 DLT system, which keeps the SVD well
/// conditioned for projected CRS coordinates in the millions.
///
/// # Errors
///
/// - [`RegistrationError::IncompleteCorrespondences`] if the set does not
///   hold four pairs.
/// - [`RegistrationError::DegenerateCorrespondence`] if any three
///   geographic or any three pixel points are (nearly) collinear, the
///   points coincide, or the solution's `H[2][2]` is too close to zero to
///   normalize.
pub fn solve_homography(
    set: &CorrespondenceSet,
    collinearity_tolerance: f64,
) -> Result<HomographySolution, RegistrationError> {
    if !set.is_frozen() {
        return Err(RegistrationError::IncompleteCorrespondences { have: set.len() });
    }
    let pairs = set.pairs();
    let geo: [Point; REQUIRED_PAIRS] = array::from_fn(|i| pairs[i].geographic);
    let pixel: [Point; REQUIRED_PAIRS] = array::from_fn(|i| pairs[i].pixel);

    check_general_position(&geo, collinearity_tolerance, "geographic")?;
    check_general_position(&pixel, collinearity_tolerance, "pixel")?;

    let (t_geo, geo_n) = normalize_points(&geo);
    let (t_pixel, pixel_n) = normalize_points(&pixel);

    // 8 DLT rows, zero-padded to 9x9 so the SVD yields a full V^T.
    let mut a = SMatrix::<f64, 9, 9>::zeros();
    for i in 0..REQUIRED_PAIRS {
        let (x, y) = (geo_n[i].x, geo_n[i].y);
        let (u, v) = (pixel_n[i].x, pixel_n[i].y);
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        a[(r, 8)] = -u;
        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        a[(r + 1, 8)] = -v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        RegistrationError::DegenerateCorrespondence("singular value decomposition failed".into())
    })?;
    let k = svd.singular_values.imin();
    let h_norm = Matrix3::from_fn(|r, c| v_t[(k, 3 * r + c)]);

    let t_pixel_inv = t_pixel.try_inverse().ok_or_else(|| {
        RegistrationError::DegenerateCorrespondence("pixel normalization is singular".into())
    })?;
    let h = t_pixel_inv * h_norm * t_geo;

    let norm = h.norm();
    if !(norm.is_finite() && norm > EPS) {
        return Err(RegistrationError::DegenerateCorrespondence(
            "null space is not isolated".into(),
        ));
    }
    let h = h / norm;
    let transform = ProjectiveTransform::from_matrix(array::from_fn(|r| {
        array::from_fn(|c| h[(r, c)])
    }))?;

    let mut max_residual_px: f64 = 0.0;
    for pair in pairs {
        let projected = transform.project(pair.geographic).map_err(|_| {
            RegistrationError::DegenerateCorrespondence(format!(
                "correspondence {} projects to infinity",
                pair.step
            ))
        })?;
        max_residual_px = max_residual_px.max(projected.distance(pair.pixel));
    }
    log::debug!(
        "solved homography from {} pairs, max residual {max_residual_px:.3e} px",
        pairs.len()
    );

    Ok(HomographySolution {
        transform,
        max_residual_px,
    })
}

/// Every 3-subset of four indices.
const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];

/// Reject point sets with three (nearly) collinear members.
///
/// Twice the triangle area of each triple is compared against the largest
/// squared pairwise distance, so the test is independent of units.
fn check_general_position(
    points: &[Point; REQUIRED_PAIRS],
    tolerance: f64,
    label: &str,
) -> Result<(), RegistrationError> {
    let mut scale: f64 = 0.0;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            scale = scale.max(a.distance_squared(*b));
        }
    }
    if !(scale.is_finite() && scale > f64::MIN_POSITIVE) {
        return Err(RegistrationError::DegenerateCorrespondence(format!(
            "{label} points coincide"
        )));
    }

    for [i, j, k] in TRIPLES {
        let (a, b, c) = (points[i], points[j], points[k]);
        let cross = (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)));
        if cross.abs() <= tolerance * scale {
            return Err(RegistrationError::DegenerateCorrespondence(format!(
                "{label} points {i}, {j}, {k} are collinear"
            )));
        }
    }
    Ok(())
}

/// Similarity that moves the centroid to the origin and scales the mean
/// distance from it to √2.
#[allow(clippy::cast_precision_loss)]
fn normalize_points(points: &[Point; REQUIRED_PAIRS]) -> (Matrix3<f64>, [Point; REQUIRED_PAIRS]) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let centroid = Point::new(cx, cy);
    let mean_dist = points.iter().map(|p| p.distance(centroid)).sum::<f64>() / n;
    let s = if mean_dist > f64::MIN_POSITIVE {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points.map(|p| Point::new(s * (p.x - cx), s * (p.y - cy)));
    (t, normalized)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::RegistrationConfig;

    const TOL: f64 = RegistrationConfig::DEFAULT_COLLINEARITY_TOLERANCE;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn set(geo: [Point; 4], pixel: [Point; 4]) -> CorrespondenceSet {
        CorrespondenceSet::from_pairs(array::from_fn(|i| (geo[i], pixel[i])))
    }

    // --- similarity mode ---

    #[test]
    fn similarity_mode_maps_extent_corners_onto_quad_corners() {
        let extent = GeographicExtent::new(0.0, 100.0, 0.0, 50.0).unwrap();
        let quad = Quadrilateral::new(200.0, 150.0, 100.0, 50.0, 90.0);
        let t = solve_similarity(&quad, &extent);
        for (geo, px) in extent.corners().iter().zip(quad.corners()) {
            assert!(t.project(*geo).distance(px) < 1e-9);
        }
    }

    // --- projective mode ---

    #[test]
    fn exact_for_axis_aligned_rectangle() {
        let geo = [p(0.0, 50.0), p(100.0, 50.0), p(100.0, 0.0), p(0.0, 0.0)];
        let pixel = [p(150.0, 125.0), p(250.0, 125.0), p(250.0, 175.0), p(150.0, 175.0)];
        let solution = solve_homography(&set(geo, pixel), TOL).unwrap();
        assert!(solution.max_residual_px < 1e-6);
        // Affine input gives an affine homography.
        let m = solution.transform.matrix();
        assert!(m[2][0].abs() < 1e-9);
        assert!(m[2][1].abs() < 1e-9);
        assert!((m[2][2] - 1.0).abs() < f64::EPSILON);
        let mid = solution.transform.project(p(50.0, 25.0)).unwrap();
        assert!(mid.distance(p(200.0, 150.0)) < 1e-6);
    }

    #[test]
    fn exact_for_perspective_quad() {
        let geo = [p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0), p(0.0, 0.0)];
        let pixel = [p(110.0, 90.0), p(420.0, 130.0), p(380.0, 400.0), p(70.0, 350.0)];
        let solution = solve_homography(&set(geo, pixel), TOL).unwrap();
        for (g, px) in geo.iter().zip(pixel) {
            assert!(solution.transform.project(*g).unwrap().distance(px) < 1e-6);
        }
    }

    #[test]
    fn exact_for_projected_crs_magnitudes() {
        // Albers-like metre coordinates mapped onto a 2000 px image.
        let geo = [
            p(-2_356_113.7, 3_172_567.9),
            p(2_258_200.2, 3_172_567.9),
            p(2_258_200.2, 269_573.6),
            p(-2_356_113.7, 269_573.6),
        ];
        let pixel = [p(102.0, 88.0), p(1911.0, 95.0), p(1890.0, 1210.0), p(121.0, 1199.0)];
        let solution = solve_homography(&set(geo, pixel), TOL).unwrap();
        assert!(solution.max_residual_px < 1e-4, "{}", solution.max_residual_px);
    }

    #[test]
    fn three_collinear_geographic_points_are_degenerate() {
        let geo = [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(0.0, 5.0)];
        let pixel = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        let err = solve_homography(&set(geo, pixel), TOL).unwrap_err();
        assert!(matches!(err, RegistrationError::DegenerateCorrespondence(_)));
    }

    #[test]
    fn three_collinear_pixel_points_are_degenerate() {
        let geo = [p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0), p(0.0, 0.0)];
        let pixel = [p(0.0, 0.0), p(50.0, 0.0), p(100.0, 0.0), p(0.0, 80.0)];
        let err = solve_homography(&set(geo, pixel), TOL).unwrap_err();
        assert!(matches!(err, RegistrationError::DegenerateCorrespondence(_)));
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let geo = [p(3.0, 3.0); 4];
        let pixel = [p(0.0, 0.0), p(50.0, 0.0), p(50.0, 50.0), p(0.0, 50.0)];
        let err = solve_homography(&set(geo, pixel), TOL).unwrap_err();
        assert!(err.to_string().contains("coincide"));
    }

    #[test]
    fn incomplete_set_is_rejected() {
        let mut s = CorrespondenceSet::new();
        s.push(p(0.0, 0.0), p(0.0, 0.0)).unwrap();
        let err = solve_homography(&s, TOL).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::IncompleteCorrespondences { have: 1 }
        ));
    }

    // --- normalization ---

    #[test]
    fn normalized_points_have_unit_scale() {
        let pts = [p(10.0, 10.0), p(30.0, 10.0), p(30.0, 30.0), p(10.0, 30.0)];
        let (_, n) = normalize_points(&pts);
        let mean = n.iter().map(|q| q.distance(p(0.0, 0.0))).sum::<f64>() / 4.0;
        assert!((mean - std::f64::consts::SQRT_2).abs() < 1e-12);
        let cx = n.iter().map(|q| q.x).sum::<f64>();
        assert!(cx.abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn perturbed_rectangles_reproduce_their_corners(
            dx in proptest::array::uniform8(-0.2f64..0.2),
            x0 in -1.0e6f64..1.0e6,
            y0 in -1.0e6f64..1.0e6,
            w in 10.0f64..1.0e5,
            h in 10.0f64..1.0e5,
        ) {
            let geo = [p(x0, y0 + h), p(x0 + w, y0 + h), p(x0 + w, y0), p(x0, y0)];
            let size = 500.0;
            let base = [p(0.0, 0.0), p(size, 0.0), p(size, size), p(0.0, size)];
            let pixel: [Point; 4] = array::from_fn(|i| {
                base[i].offset(dx[2 * i] * size, dx[2 * i + 1] * size)
            });
            let solution = solve_homography(&set(geo, pixel), TOL).unwrap();
            for (g, px) in geo.iter().zip(pixel) {
                let projected = solution.transform.project(*g).unwrap();
                prop_assert!(projected.distance(px) < 1e-3);
            }
        }
    }
}
