//! mapreg-export: Overlay renderers for registered boundaries.
//!
//! Turns projected polylines into an SVG document that can be laid over
//! the displayed image, or a raster preview composited onto the image
//! itself. No file I/O happens here.

pub mod raster;
pub mod style;
pub mod svg;

pub use raster::render_overlay;
pub use style::OverlayStyle;
pub use svg::{SvgMetadata, build_path_data, to_overlay_svg};
