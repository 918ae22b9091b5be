//! SVG overlay serializer.
//!
//! Writes the projected boundary as one `<path>` per polyline, optionally
//! with the registration frame as a closed outline, in display pixel
//! coordinates. The document's `viewBox` matches the display size so the
//! SVG can be laid directly over the displayed image.
//!
//! This is a pure function with no I/O; it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use mapreg_core::{Dimensions, Point, Polyline, ProjectedPolyline};

use crate::style::OverlayStyle;

/// Optional text embedded in the SVG document.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`, typically the region name.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Confirmed registration JSON, emitted inside `<metadata>` as a
    /// namespaced `<mapreg:registration>` element so the file carries its
    /// own alignment.
    pub registration_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute from a polyline.
///
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use mapreg_core::{Point, Polyline};
/// use mapreg_export::build_path_data;
///
/// let polyline = Polyline::new(vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
/// assert_eq!(build_path_data(&polyline), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Closed path through the four frame corners.
fn frame_path_data(corners: &[Point; 4]) -> String {
    let [first, rest @ ..] = corners;
    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Serialize a projected overlay into an SVG document.
///
/// Polylines with fewer than 2 points are skipped. Truncated polylines
/// are drawn as far as they go and tagged `data-truncated="true"`.
#[must_use]
pub fn to_overlay_svg(
    lines: &[ProjectedPolyline],
    dimensions: Dimensions,
    frame: Option<&[Point; 4]>,
    style: &OverlayStyle,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(json) = metadata.registration_json {
        let mut registration = Element::new("mapreg:registration");
        registration.assign("xmlns:mapreg", "urn:mapreg:registration:1");
        registration.append(Text::new(json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(registration);
        doc = doc.add(metadata_el);
    }

    let mut boundary = Group::new()
        .set("id", "boundary")
        .set("fill", "none")
        .set("stroke", style.color_hex())
        .set("stroke-width", style.line_width)
        .set("stroke-linecap", "round")
        .set("stroke-linejoin", "round");
    for line in lines {
        let d = build_path_data(&line.polyline);
        if d.is_empty() {
            continue;
        }
        let mut path = Path::new().set("d", d);
        if !line.complete {
            path = path.set("data-truncated", "true");
        }
        boundary = boundary.add(path);
    }
    doc = doc.add(boundary);

    if let Some(corners) = frame {
        let outline = Path::new()
            .set("id", "frame")
            .set("d", frame_path_data(corners))
            .set("fill", "none")
            .set("stroke", style.frame_color_hex())
            .set("stroke-width", style.frame_width);
        doc = doc.add(outline);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn line(points: &[(f64, f64)], complete: bool) -> ProjectedPolyline {
        ProjectedPolyline {
            polyline: Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect()),
            complete,
        }
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_single_point() {
        let polyline = Polyline::new(vec![Point::new(5.0, 5.0)]);
        assert_eq!(build_path_data(&polyline), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let polyline = Polyline::new(vec![
            Point::new(10.0, 15.0),
            Point::new(12.5, 18.3),
            Point::new(14.0, 20.1),
        ]);
        assert_eq!(build_path_data(&polyline), "M10,15 L12.5,18.3 L14,20.1");
    }

    #[test]
    fn frame_path_is_closed() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        assert_eq!(frame_path_data(&corners), "M0,0 L10,0 L10,5 L0,5 z");
    }

    // --- documents ---

    #[test]
    fn empty_overlay_is_valid_svg() {
        let svg = to_overlay_svg(&[], dims(100, 50), None, &OverlayStyle::default(), &SvgMetadata::default());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(!svg.contains("<path"));
        assert!(!svg.contains(r#"id="frame""#));
    }

    #[test]
    fn lines_and_frame_are_styled() {
        let lines = [
            line(&[(0.0, 0.0), (10.0, 10.0)], true),
            line(&[(5.0, 5.0)], true),
            line(&[(1.0, 1.0), (2.0, 2.0)], false),
        ];
        let corners = [
            Point::new(1.0, 1.0),
            Point::new(9.0, 1.0),
            Point::new(9.0, 9.0),
            Point::new(1.0, 9.0),
        ];
        let svg = to_overlay_svg(
            &lines,
            dims(20, 20),
            Some(&corners),
            &OverlayStyle::default(),
            &SvgMetadata::default(),
        );
        assert_eq!(svg.matches("<path").count(), 3);
        assert_eq!(svg.matches(r#"data-truncated="true""#).count(), 1);
        assert!(svg.contains(r##"stroke="#ff0000""##));
        assert!(svg.contains(r##"stroke="#ffff00""##));
    }

    #[test]
    fn metadata_is_escaped() {
        let meta = SvgMetadata {
            title: Some("CONUS & <territories>"),
            description: Some("similarity"),
            registration_json: Some(r#"{"rect4":[[0,0],[1,0],[1,1],[0,1]]}"#),
        };
        let svg = to_overlay_svg(&[], dims(10, 10), None, &OverlayStyle::default(), &meta);
        assert!(svg.contains("<title>CONUS &amp; &lt;territories&gt;</title>"));
        assert!(svg.contains("<desc>similarity</desc>"));
        assert!(svg.contains(r#"xmlns:mapreg="urn:mapreg:registration:1""#));
        assert!(svg.contains("rect4"));
    }
}
