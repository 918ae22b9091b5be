//! Project geographic polylines into display pixels for overlay rendering.
//!
//! [`project_geometry`] is a pure function of `(collection, transform)`
//! and returns a lazy iterator; it is cheap to call once per animation
//! frame while the user drags. A point that cannot be projected truncates
//! only its own polyline, which is flagged incomplete, so one bad vertex
//! never blanks the whole overlay.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::boundary::GeometryCollection;
use crate::transform::Transform;
use crate::types::Polyline;

/// One polyline after projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPolyline {
    /// Pixel-space points, up to (not including) the first point that
    /// failed to project.
    pub polyline: Polyline,
    /// `false` if the source polyline was truncated.
    pub complete: bool,
}

/// Lazy projection of a [`GeometryCollection`].
///
/// Cloning the iterator restarts nothing; call [`project_geometry`] again
/// for a fresh pass.
#[derive(Debug, Clone)]
pub struct ProjectedLines<'a> {
    remaining: std::slice::Iter<'a, Polyline>,
    transform: &'a Transform,
}

impl Iterator for ProjectedLines<'_> {
    type Item = ProjectedPolyline;

    fn next(&mut self) -> Option<Self::Item> {
        let source = self.remaining.next()?;
        Some(project_polyline(source, self.transform))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.remaining.size_hint()
    }
}

impl ExactSizeIterator for ProjectedLines<'_> {}

/// Project every polyline of `collection` through `transform`.
#[must_use = "the projection is lazy; iterate it to render"]
pub fn project_geometry<'a>(
    collection: &'a GeometryCollection,
    transform: &'a Transform,
) -> ProjectedLines<'a> {
    ProjectedLines {
        remaining: collection.polylines().iter(),
        transform,
    }
}

/// Project one polyline, stopping at the first undefined point.
#[must_use]
pub fn project_polyline(source: &Polyline, transform: &Transform) -> ProjectedPolyline {
    let mut points = Vec::with_capacity(source.len());
    for &geo in source.points() {
        match transform.project_point(geo) {
            Ok(px) => points.push(px),
            Err(e) => {
                log::warn!(
                    "truncating polyline after {} of {} points: {e}",
                    points.len(),
                    source.len()
                );
                return ProjectedPolyline {
                    polyline: Polyline::new(points),
                    complete: false,
                };
            }
        }
    }
    ProjectedPolyline {
        polyline: Polyline::new(points),
        complete: true,
    }
}

/// Counts describing one projection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    /// Polylines produced.
    pub polylines: usize,
    /// Points successfully projected.
    pub points: usize,
    /// Polylines cut short by an undefined point.
    pub truncated_polylines: usize,
    /// Source points lost to truncation.
    pub dropped_points: usize,
    /// Polylines with fewer than two points (nothing to draw).
    pub undrawable_polylines: usize,
}

impl ProjectionSummary {
    /// Tally a projection pass against its source collection.
    #[must_use]
    pub fn collect(collection: &GeometryCollection, transform: &Transform) -> Self {
        let mut summary = Self::default();
        for (source, projected) in collection
            .polylines()
            .iter()
            .zip(project_geometry(collection, transform))
        {
            summary.polylines += 1;
            summary.points += projected.polyline.len();
            if !projected.complete {
                summary.truncated_polylines += 1;
                summary.dropped_points += source.len() - projected.polyline.len();
            }
            if projected.polyline.len() < 2 {
                summary.undrawable_polylines += 1;
            }
        }
        summary
    }

    /// Human-readable multi-line report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Projection summary");
        let _ = writeln!(out, "{}", "-".repeat(40));
        let _ = writeln!(out, "{:<24} {:>12}", "Polylines", self.polylines);
        let _ = writeln!(out, "{:<24} {:>12}", "Points", self.points);
        let _ = writeln!(out, "{:<24} {:>12}", "Truncated polylines", self.truncated_polylines);
        let _ = writeln!(out, "{:<24} {:>12}", "Dropped points", self.dropped_points);
        let _ = write!(out, "{:<24} {:>12}", "Undrawable polylines", self.undrawable_polylines);
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::quad::Quadrilateral;
    use crate::transform::{ProjectiveTransform, similarity_from_quad};
    use crate::types::{GeographicExtent, Point};

    fn collection() -> GeometryCollection {
        GeometryCollection::new(vec![
            Polyline::new(vec![Point::new(0.0, 50.0), Point::new(100.0, 50.0)]),
            Polyline::new(vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 25.0),
                Point::new(100.0, 0.0),
            ]),
        ])
    }

    fn similarity() -> Transform {
        let extent = GeographicExtent::new(0.0, 100.0, 0.0, 50.0).unwrap();
        let quad = Quadrilateral::new(200.0, 150.0, 100.0, 50.0, 0.0);
        Transform::Similarity(similarity_from_quad(&quad, &extent))
    }

    /// Homography whose line at infinity is `x = 50`.
    fn vanishing_at_x50() -> Transform {
        Transform::Projective(
            ProjectiveTransform::from_matrix([
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [-0.02, 0.0, 1.0],
            ])
            .unwrap(),
        )
    }

    #[test]
    fn similarity_projects_every_point() {
        let c = collection();
        let t = similarity();
        let lines: Vec<_> = project_geometry(&c, &t).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.complete));
        assert_eq!(
            lines[0].polyline.points(),
            &[Point::new(150.0, 125.0), Point::new(250.0, 125.0)]
        );
        assert_eq!(lines[1].polyline.points()[1], Point::new(200.0, 150.0));
    }

    #[test]
    fn projection_is_restartable() {
        let c = collection();
        let t = similarity();
        let first: Vec<_> = project_geometry(&c, &t).collect();
        let second: Vec<_> = project_geometry(&c, &t).collect();
        assert_eq!(first, second);

        let iter = project_geometry(&c, &t);
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.clone().count(), iter.count());
    }

    #[test]
    fn undefined_point_truncates_only_its_polyline() {
        let c = collection();
        let t = vanishing_at_x50();
        let lines: Vec<_> = project_geometry(&c, &t).collect();

        // First polyline: x = 0 is fine, x = 100 gives w = -1 (defined).
        assert!(lines[0].complete);
        assert_eq!(lines[0].polyline.len(), 2);

        // Second polyline: the middle point sits on the line at infinity.
        assert!(!lines[1].complete);
        assert_eq!(lines[1].polyline.points(), &[Point::new(0.0, 0.0)]);
    }

    #[test]
    fn summary_counts_truncation() {
        let c = collection();
        let summary = ProjectionSummary::collect(&c, &vanishing_at_x50());
        assert_eq!(summary.polylines, 2);
        assert_eq!(summary.points, 3);
        assert_eq!(summary.truncated_polylines, 1);
        assert_eq!(summary.dropped_points, 2);
        assert_eq!(summary.undrawable_polylines, 1);
        assert!(summary.report().contains("Truncated polylines"));
    }

    #[test]
    fn empty_collection_projects_nothing() {
        let c = GeometryCollection::default();
        let t = similarity();
        assert_eq!(project_geometry(&c, &t).count(), 0);
        assert_eq!(ProjectionSummary::collect(&c, &t), ProjectionSummary::default());
    }
}
