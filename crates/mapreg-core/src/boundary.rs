//! Inbound boundary data: the geographic polylines to register.
//!
//! The document shape is the one served by the boundary backend:
//!
//! ```json
//! {
//!   "status": "success",
//!   "bounds": {"xmin": 0, "xmax": 100, "ymin": 0, "ymax": 50},
//!   "geojson": {"features": [{"geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}]}
//! }
//! ```
//!
//! Parsing is lenient below the feature level: a feature whose geometry
//! is missing, of an unsupported type, or malformed is skipped rather
//! than failing the whole document.

use geo::{BoundingRect, Coord, LineString, MultiLineString};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{GeographicExtent, Point, Polyline, RegistrationError};

/// The polylines of a boundary, in geographic units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryCollection(Vec<Polyline>);

impl GeometryCollection {
    #[must_use]
    pub const fn new(polylines: Vec<Polyline>) -> Self {
        Self(polylines)
    }

    #[must_use]
    pub fn polylines(&self) -> &[Polyline] {
        &self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of points across all polylines.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.0.iter().map(Polyline::len).sum()
    }

    /// Tight axis-aligned extent of every point.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidExtent`] if the collection is
    /// empty or all points share an X or Y value.
    pub fn bounding_extent(&self) -> Result<GeographicExtent, RegistrationError> {
        let lines: MultiLineString<f64> = self
            .0
            .iter()
            .map(|pl| LineString::new(pl.points().iter().copied().map(point_to_coord).collect()))
            .collect();
        let rect = lines
            .bounding_rect()
            .ok_or(RegistrationError::InvalidExtent {
                xmin: 0.0,
                xmax: 0.0,
                ymin: 0.0,
                ymax: 0.0,
            })?;
        GeographicExtent::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }
}

const fn point_to_coord(p: Point) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

/// A parsed boundary document.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryDocument {
    /// Backend status string, if present.
    pub status: Option<String>,
    /// Declared bounds, or the geometry's own extent when none were sent.
    pub extent: GeographicExtent,
    pub geometry: GeometryCollection,
    /// Features dropped because their geometry was unusable.
    pub skipped_features: usize,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    bounds: Option<RawBounds>,
    geojson: RawFeatureCollection,
}

#[derive(Deserialize)]
struct RawBounds {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

#[derive(Deserialize)]
struct RawFeatureCollection {
    // Kept as raw values so one malformed feature cannot fail the document.
    #[serde(default)]
    features: Vec<Value>,
}

impl BoundaryDocument {
    /// Parse a boundary document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::BoundaryParse`] for malformed JSON or a
    /// missing `geojson` member, and [`RegistrationError::InvalidExtent`]
    /// when the declared (or derived) extent has zero area.
    pub fn from_json(json: &str) -> Result<Self, RegistrationError> {
        let raw: RawDocument = serde_json::from_str(json)?;

        let mut polylines = Vec::new();
        let mut skipped_features = 0;
        for (index, feature) in raw.geojson.features.iter().enumerate() {
            let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
                log::debug!("feature {index}: no geometry, skipped");
                skipped_features += 1;
                continue;
            };
            match parse_geometry(geometry) {
                Some(lines) => polylines.extend(lines.into_iter().filter(|l| !l.is_empty())),
                None => {
                    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("untyped");
                    log::debug!("feature {index}: unusable {kind} geometry, skipped");
                    skipped_features += 1;
                }
            }
        }
        let geometry = GeometryCollection::new(polylines);

        let extent = match raw.bounds {
            Some(b) => GeographicExtent::new(b.xmin, b.xmax, b.ymin, b.ymax)?,
            None => {
                log::debug!("no bounds in document, deriving from geometry");
                geometry.bounding_extent()?
            }
        };

        Ok(Self {
            status: raw.status,
            extent,
            geometry,
            skipped_features,
        })
    }
}

/// Polylines for one geometry object, or `None` if its type is missing or
/// unsupported or its coordinates are malformed.
fn parse_geometry(geometry: &Value) -> Option<Vec<Polyline>> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "LineString" => Some(vec![parse_line(coords)?]),
        // Polygon rings are drawn as their outlines.
        "MultiLineString" | "Polygon" => parse_lines(coords),
        "MultiPolygon" => {
            let mut out = Vec::new();
            for polygon in coords.as_array()? {
                out.extend(parse_lines(polygon)?);
            }
            Some(out)
        }
        _ => None,
    }
}

fn parse_lines(value: &Value) -> Option<Vec<Polyline>> {
    value.as_array()?.iter().map(parse_line).collect()
}

fn parse_line(value: &Value) -> Option<Polyline> {
    let points = value
        .as_array()?
        .iter()
        .map(parse_position)
        .collect::<Option<Vec<_>>>()?;
    Some(Polyline::new(points))
}

/// A GeoJSON position; ordinates past the second are ignored.
fn parse_position(value: &Value) -> Option<Point> {
    match value.as_array()?.as_slice() {
        [x, y, ..] => Some(Point::new(x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}
