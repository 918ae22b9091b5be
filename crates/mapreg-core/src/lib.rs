//! mapreg-core: Manual registration of vector boundaries onto raster maps
//! (sans-IO).
//!
//! A user aligns a region's boundary polylines with a scanned or rendered
//! map image in one of two ways:
//!
//! - **Similarity mode**: drag, resize and rotate a registration frame
//!   over the image. The frame's parameters are the transform.
//! - **Projective mode**: click four geographic/pixel correspondences and
//!   solve the homography between them.
//!
//! Either way the boundary is re-projected for the live overlay and the
//! confirmed result leaves as four corner pixels in the image's natural
//! resolution.
//!
//! This crate has **no I/O dependencies**: it parses JSON from strings,
//! takes pointer events as plain coordinates and returns structured data.
//! Rendering and file handling live in `mapreg-export` and `mapreg-cli`.

pub mod boundary;
pub mod config;
pub mod correspondence;
pub mod descriptor;
pub mod interaction;
pub mod projector;
pub mod quad;
pub mod session;
pub mod solver;
pub mod transform;
pub mod types;

pub use boundary::{BoundaryDocument, GeometryCollection};
pub use config::RegistrationConfig;
pub use correspondence::{Correspondence, CorrespondenceSet};
pub use descriptor::{BoundsDocument, DisplayMapping, LegacyRectDescriptor, Rect4, RectDescriptor};
pub use interaction::{InteractionController, InteractionState, NoCapture, PointerCapture};
pub use projector::{ProjectedPolyline, ProjectionSummary, project_geometry};
pub use quad::{Corner, Quadrilateral, point_in_quad};
pub use session::{ConfirmedRegistration, Region, RegionConfig, RegistrationMode, RegistrationSession};
pub use solver::{HomographySolution, solve_homography, solve_similarity};
pub use transform::{ProjectiveTransform, SimilarityTransform, Transform};
pub use types::{Dimensions, GeographicExtent, Point, Polyline, RegistrationError};
