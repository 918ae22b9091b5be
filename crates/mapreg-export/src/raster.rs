//! Raster overlay rendering via tiny-skia.
//!
//! The overlay is stroked anti-aliased onto a transparent pixmap at the
//! base image's (natural) resolution, un-premultiplied into an
//! [`RgbaImage`], then alpha-composited over the base image.

use image::{Rgba, RgbaImage, imageops};
use tiny_skia::{LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use mapreg_core::{Point, ProjectedPolyline};

use crate::style::OverlayStyle;

/// Draw `lines` (and optionally the frame `corners`) over `base`.
///
/// Coordinates are in display pixels and are multiplied by `scale`
/// (natural pixels per display pixel, per axis) before drawing.
#[must_use]
pub fn render_overlay(
    base: &RgbaImage,
    lines: &[ProjectedPolyline],
    frame: Option<&[Point; 4]>,
    style: &OverlayStyle,
    scale: (f64, f64),
) -> RgbaImage {
    let (width, height) = base.dimensions();
    let mut out = base.clone();
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return out;
    };

    if let Some(path) = lines_path(lines, scale) {
        stroke(&mut pixmap, &path, style.color, style.line_width);
    }
    if let Some(path) = frame.and_then(|corners| frame_path(corners, scale)) {
        stroke(&mut pixmap, &path, style.frame_color, style.frame_width);
    }

    imageops::overlay(&mut out, &unpremultiply(&pixmap), 0, 0);
    out
}

#[allow(clippy::cast_possible_truncation)]
fn scaled(p: Point, (sx, sy): (f64, f64)) -> (f32, f32) {
    ((p.x * sx) as f32, (p.y * sy) as f32)
}

/// One path holding every drawable polyline as a subpath.
fn lines_path(lines: &[ProjectedPolyline], scale: (f64, f64)) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for line in lines {
        let points = line.polyline.points();
        if points.len() < 2 {
            continue;
        }
        let (x, y) = scaled(points[0], scale);
        pb.move_to(x, y);
        for &p in &points[1..] {
            let (x, y) = scaled(p, scale);
            pb.line_to(x, y);
        }
    }
    pb.finish()
}

fn frame_path(corners: &[Point; 4], scale: (f64, f64)) -> Option<Path> {
    let mut pb = PathBuilder::new();
    let (x, y) = scaled(corners[0], scale);
    pb.move_to(x, y);
    for &p in &corners[1..] {
        let (x, y) = scaled(p, scale);
        pb.line_to(x, y);
    }
    pb.close();
    pb.finish()
}

#[allow(clippy::cast_possible_truncation)]
fn stroke(pixmap: &mut Pixmap, path: &Path, [r, g, b]: [u8; 3], width: f64) {
    let stroke = Stroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    pixmap.stroke_path(path, &paint, &stroke, Transform::identity(), None);
}

/// Convert a premultiplied pixmap into a straight-alpha image.
#[allow(clippy::cast_possible_truncation)]
fn unpremultiply(pixmap: &Pixmap) -> RgbaImage {
    let data = pixmap.data();
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (i, pixel) in img.pixels_mut().enumerate() {
        let off = i * 4;
        let a = data[off + 3];
        if a == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            let channel = |c: u8| (u16::from(c) * 255 / u16::from(a)) as u8;
            *pixel = Rgba([
                channel(data[off]),
                channel(data[off + 1]),
                channel(data[off + 2]),
                a,
            ]);
        }
    }
    img
}
