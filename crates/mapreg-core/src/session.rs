//! One region's registration, from boundary load to confirmed rectangle.
//!
//! A [`RegistrationSession`] owns everything needed to register a single
//! region's boundary onto the raster: the boundary document, the frame
//! editor, the homography correspondences and the display mapping. Each
//! map region (CONUS, Alaska, Hawaii) gets its own session, parametrized by
//! a [`RegionConfig`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryDocument;
use crate::config::RegistrationConfig;
use crate::correspondence::{Correspondence, CorrespondenceSet};
use crate::descriptor::{DisplayMapping, LegacyRectDescriptor, Rect4, RectDescriptor};
use crate::interaction::{InteractionController, NoCapture, PointerCapture};
use crate::projector::{ProjectedPolyline, project_geometry};
use crate::quad::Quadrilateral;
use crate::solver::{HomographySolution, solve_homography};
use crate::transform::{Transform, similarity_from_quad};
use crate::types::{Dimensions, Point, RegistrationError};

/// A map region with its own inset on the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "CONUS")]
    Conus,
    Alaska,
    Hawaii,
}

impl Region {
    pub const ALL: [Self; 3] = [Self::Conus, Self::Alaska, Self::Hawaii];

    /// Canonical name, as used in bounds documents.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Conus => "CONUS",
            Self::Alaska => "Alaska",
            Self::Hawaii => "Hawaii",
        }
    }

    /// Default presentation for this region.
    #[must_use]
    pub const fn config(self) -> RegionConfig {
        let color = match self {
            Self::Conus => [255, 0, 0],
            Self::Alaska => [0, 255, 0],
            Self::Hawaii => [0, 0, 255],
        };
        RegionConfig {
            region: self,
            color,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = RegistrationError;

    /// Case-insensitive; also accepts the postal codes `AK` and `HI`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conus" => Ok(Self::Conus),
            "alaska" | "ak" => Ok(Self::Alaska),
            "hawaii" | "hi" => Ok(Self::Hawaii),
            _ => {
                let known: Vec<&str> = Self::ALL.iter().map(|r| r.name()).collect();
                Err(RegistrationError::InvalidConfig(format!(
                    "unknown region '{s}', expected one of {}",
                    known.join(", ")
                )))
            }
        }
    }
}

/// Per-region session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub region: Region,
    /// Overlay stroke color, RGB.
    pub color: [u8; 3],
}

/// How the geographic-to-pixel transform is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// The user manipulates the frame directly.
    #[default]
    Similarity,
    /// The user clicks four point correspondences.
    Projective,
}

/// The outbound result of a confirmed registration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfirmedRegistration {
    Rect(RectDescriptor),
    Legacy(LegacyRectDescriptor),
}

impl ConfirmedRegistration {
    #[must_use]
    pub const fn rect4(&self) -> &Rect4 {
        match self {
            Self::Rect(d) => &d.rect4,
            Self::Legacy(d) => &d.rect4,
        }
    }
}

/// Registration state for one region.
#[derive(Debug)]
pub struct RegistrationSession<C: PointerCapture = NoCapture> {
    region: RegionConfig,
    boundary: BoundaryDocument,
    config: RegistrationConfig,
    controller: InteractionController<C>,
    mapping: Option<DisplayMapping>,
    /// Whether a fitted frame has been seeded from a loaded image.
    fitted: bool,
    mode: RegistrationMode,
    correspondences: CorrespondenceSet,
    solution: Option<HomographySolution>,
}

impl RegistrationSession<NoCapture> {
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn new(
        region: RegionConfig,
        boundary: BoundaryDocument,
        config: RegistrationConfig,
    ) -> Result<Self, RegistrationError> {
        Self::with_capture(region, boundary, config, NoCapture)
    }
}

impl<C: PointerCapture> RegistrationSession<C> {
    /// Session whose frame editor reports drags to `capture`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn with_capture(
        region: RegionConfig,
        boundary: BoundaryDocument,
        config: RegistrationConfig,
        capture: C,
    ) -> Result<Self, RegistrationError> {
        config.validate()?;
        // Placeholder until the image reports its size.
        let placeholder = Quadrilateral::new(0.0, 0.0, config.min_size, config.min_size, 0.0);
        let controller = InteractionController::with_capture(config.clone(), placeholder, capture);
        Ok(Self {
            region,
            boundary,
            config,
            controller,
            mapping: None,
            fitted: false,
            mode: RegistrationMode::default(),
            correspondences: CorrespondenceSet::new(),
            solution: None,
        })
    }

    #[must_use]
    pub const fn region(&self) -> &RegionConfig {
        &self.region
    }

    #[must_use]
    pub const fn boundary(&self) -> &BoundaryDocument {
        &self.boundary
    }

    #[must_use]
    pub const fn mapping(&self) -> Option<&DisplayMapping> {
        self.mapping.as_ref()
    }

    /// Record the image's natural and display sizes.
    ///
    /// The first successful call seeds a frame fitted to the display;
    /// later calls (e.g. on window resize or reload) leave the frame alone.
    ///
    /// A zero size means the image is not (or no longer) loaded: the
    /// mapping is dropped and pointer input is ignored until a valid size
    /// arrives. The seeded frame is kept.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::ImageNotReady`] if either size is zero.
    pub fn set_image(&mut self, natural: Dimensions, display: Dimensions) -> Result<(), RegistrationError> {
        let mapping = match DisplayMapping::new(natural, display) {
            Ok(mapping) => mapping,
            Err(e) => {
                self.controller.set_ready(false);
                self.mapping = None;
                return Err(e);
            }
        };
        if !self.fitted {
            let quad = Quadrilateral::fitted(
                &self.boundary.extent,
                display,
                self.config.fit_fraction,
                self.config.min_size,
            );
            log::debug!("{}: seeded fitted frame {quad:?}", self.region.region);
            self.controller.seed(quad);
            self.fitted = true;
        }
        self.mapping = Some(mapping);
        self.controller.set_ready(true);
        Ok(())
    }

    /// Seed the frame from a user-drawn rectangle (any two opposite
    /// corners, display pixels).
    pub fn seed_from_rect(&mut self, a: Point, b: Point) {
        self.seed(Quadrilateral::from_corners(a, b, self.config.min_size));
    }

    /// Seed the frame directly; [`reset`](Self::reset) returns here.
    pub fn seed(&mut self, quad: Quadrilateral) {
        self.controller.seed(quad.clamped_to(self.config.min_size));
    }

    /// The frame editor, for reading the live frame.
    #[must_use]
    pub const fn controller(&self) -> &InteractionController<C> {
        &self.controller
    }

    /// The frame editor, for feeding pointer events.
    pub const fn controller_mut(&mut self) -> &mut InteractionController<C> {
        &mut self.controller
    }

    #[must_use]
    pub const fn mode(&self) -> RegistrationMode {
        self.mode
    }

    /// Switch modes. Collected correspondences are kept.
    pub fn set_mode(&mut self, mode: RegistrationMode) {
        if mode != self.mode {
            self.controller.cancel();
            self.mode = mode;
        }
    }

    #[must_use]
    pub const fn correspondences(&self) -> &CorrespondenceSet {
        &self.correspondences
    }

    /// The homography solved from four correspondences, once available.
    #[must_use]
    pub const fn solution(&self) -> Option<&HomographySolution> {
        self.solution.as_ref()
    }

    /// Record a correspondence; the fourth one triggers the solve.
    ///
    /// Returns the step the pair was stored at.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::CorrespondenceSetFull`] if four pairs are
    ///   already held.
    /// - [`RegistrationError::DegenerateCorrespondence`] if the completed
    ///   set has no unique homography. The offending fourth pair is
    ///   removed so it can be picked again.
    pub fn add_correspondence(&mut self, geographic: Point, pixel: Point) -> Result<usize, RegistrationError> {
        let step = self.correspondences.push(geographic, pixel)?;
        if self.correspondences.is_frozen() {
            match solve_homography(&self.correspondences, self.config.collinearity_tolerance) {
                Ok(solution) => self.solution = Some(solution),
                Err(e) => {
                    self.correspondences.undo();
                    return Err(e);
                }
            }
        }
        Ok(step)
    }

    /// Remove the most recent correspondence, discarding any solution.
    pub fn undo_correspondence(&mut self) -> Option<Correspondence> {
        self.solution = None;
        self.correspondences.undo()
    }

    /// The current geographic-to-display-pixel transform.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::IncompleteCorrespondences`] in
    /// projective mode before four pairs have been solved.
    pub fn transform(&self) -> Result<Transform, RegistrationError> {
        match self.mode {
            RegistrationMode::Similarity => Ok(Transform::Similarity(similarity_from_quad(
                self.controller.quad(),
                &self.boundary.extent,
            ))),
            RegistrationMode::Projective => self
                .solution
                .map(|s| Transform::Projective(s.transform))
                .ok_or(RegistrationError::IncompleteCorrespondences {
                    have: self.correspondences.len(),
                }),
        }
    }

    /// The boundary projected through [`transform`](Self::transform), in
    /// display pixels.
    ///
    /// # Errors
    ///
    /// As [`transform`](Self::transform).
    pub fn overlay(&self) -> Result<Vec<ProjectedPolyline>, RegistrationError> {
        let transform = self.transform()?;
        Ok(project_geometry(&self.boundary.geometry, &transform).collect())
    }

    /// Return the frame to its seed and discard all correspondences.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.correspondences.clear();
        self.solution = None;
    }

    /// Produce the outbound descriptor for the current registration.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::ImageNotReady`] before [`set_image`](Self::set_image).
    /// - [`RegistrationError::IncompleteCorrespondences`] in projective
    ///   mode without a solution.
    /// - [`RegistrationError::UndefinedProjection`] if an extent corner
    ///   has no image under the homography.
    pub fn confirm(&self) -> Result<ConfirmedRegistration, RegistrationError> {
        let mapping = self.mapping.as_ref().ok_or(RegistrationError::ImageNotReady)?;
        let confirmed = match self.mode {
            RegistrationMode::Similarity => {
                ConfirmedRegistration::Rect(RectDescriptor::from_quad(self.controller.quad(), mapping))
            }
            RegistrationMode::Projective => ConfirmedRegistration::Legacy(
                LegacyRectDescriptor::from_transform(&self.transform()?, &self.boundary.extent, mapping)?,
            ),
        };
        log::debug!("{}: confirmed {:?}", self.region.region, confirmed.rect4());
        Ok(confirmed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interaction::InteractionState;

    const BOUNDARY: &str = r#"{
        "status": "success",
        "bounds": {"xmin": 0, "xmax": 100, "ymin": 0, "ymax": 50},
        "geojson": {"features": [
            {"geometry": {"type": "LineString", "coordinates": [[0, 50], [100, 50], [100, 0]]}},
            {"geometry": {"type": "LineString", "coordinates": [[50, 25], [60, 30]]}}
        ]}
    }"#;

    fn session() -> RegistrationSession {
        let boundary = BoundaryDocument::from_json(BOUNDARY).unwrap();
        RegistrationSession::new(Region::Conus.config(), boundary, RegistrationConfig::default()).unwrap()
    }

    fn loaded() -> RegistrationSession {
        let mut s = session();
        s.set_image(Dimensions::new(1600, 1200), Dimensions::new(800, 600)).unwrap();
        s
    }

    fn assert_close(a: Point, b: Point) {
        assert!(a.distance(b) < 1e-6, "{a:?} != {b:?}");
    }

    // --- regions ---

    #[test]
    fn region_colors_and_names() {
        assert_eq!(Region::Conus.config().color, [255, 0, 0]);
        assert_eq!(Region::Alaska.config().color, [0, 255, 0]);
        assert_eq!(Region::Hawaii.config().color, [0, 0, 255]);
        assert_eq!(Region::Conus.to_string(), "CONUS");
        assert_eq!("ak".parse::<Region>().unwrap(), Region::Alaska);
        assert_eq!("Hawaii".parse::<Region>().unwrap(), Region::Hawaii);
        let err = "guam".parse::<Region>().unwrap_err();
        assert!(err.to_string().contains("CONUS, Alaska, Hawaii"), "{err}");
    }

    // --- lifecycle ---

    #[test]
    fn invalid_config_is_rejected() {
        let boundary = BoundaryDocument::from_json(BOUNDARY).unwrap();
        let config = RegistrationConfig {
            handle_radius: -1.0,
            ..RegistrationConfig::default()
        };
        assert!(RegistrationSession::new(Region::Conus.config(), boundary, config).is_err());
    }

    #[test]
    fn confirm_before_image_is_not_ready() {
        let err = session().confirm().unwrap_err();
        assert!(matches!(err, RegistrationError::ImageNotReady));
    }

    #[test]
    fn pointer_down_before_image_is_ignored() {
        let mut s = session();
        assert_eq!(s.controller_mut().pointer_down(Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn first_image_load_seeds_fitted_frame() {
        let mut s = loaded();
        let q = *s.controller().quad();
        assert_eq!(q, Quadrilateral::new(400.0, 300.0, 640.0, 320.0, 0.0));

        // A resize does not reseed.
        s.controller_mut().pointer_down(Point::new(400.0, 300.0));
        s.controller_mut().pointer_move(Point::new(410.0, 300.0));
        s.controller_mut().pointer_up();
        s.set_image(Dimensions::new(1600, 1200), Dimensions::new(400, 300)).unwrap();
        assert!((s.controller().quad().center_x - 410.0).abs() < 1e-9);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let mut s = session();
        let err = s.set_image(Dimensions::new(0, 0), Dimensions::new(0, 0)).unwrap_err();
        assert!(matches!(err, RegistrationError::ImageNotReady));
        assert!(s.mapping().is_none());
    }

    #[test]
    fn unloaded_image_disarms_pointer_input() {
        let mut s = loaded();
        let frame = *s.controller().quad();
        let err = s.set_image(Dimensions::new(0, 0), Dimensions::new(800, 600)).unwrap_err();
        assert!(matches!(err, RegistrationError::ImageNotReady));
        assert!(s.mapping().is_none());
        assert_eq!(s.controller_mut().pointer_down(Point::new(400.0, 300.0)), None);
        assert!(matches!(s.confirm(), Err(RegistrationError::ImageNotReady)));

        // Reloading restores input without refitting the frame.
        s.set_image(Dimensions::new(1600, 1200), Dimensions::new(800, 600)).unwrap();
        assert_eq!(*s.controller().quad(), frame);
        assert_eq!(
            s.controller_mut().pointer_down(Point::new(400.0, 300.0)),
            Some(InteractionState::DraggingWhole)
        );
    }

    #[test]
    fn unload_mid_drag_ends_the_drag() {
        let mut s = loaded();
        s.controller_mut().pointer_down(Point::new(400.0, 300.0));
        assert!(s.controller().state().is_dragging());
        assert!(s.set_image(Dimensions::new(800, 600), Dimensions::new(0, 0)).is_err());
        assert_eq!(s.controller().state(), InteractionState::Idle);
    }

    // --- similarity mode ---

    #[test]
    fn similarity_overlay_follows_frame() {
        let mut s = loaded();
        s.seed(Quadrilateral::new(200.0, 150.0, 100.0, 50.0, 0.0));
        let overlay = s.overlay().unwrap();
        assert_eq!(overlay.len(), 2);
        assert_close(overlay[0].polyline.points()[0], Point::new(150.0, 125.0));
        assert_close(overlay[1].polyline.points()[0], Point::new(200.0, 150.0));
    }

    #[test]
    fn similarity_confirm_emits_natural_rect() {
        let mut s = loaded();
        s.seed_from_rect(Point::new(150.0, 125.0), Point::new(250.0, 175.0));
        let confirmed = s.confirm().unwrap();
        assert!(matches!(confirmed, ConfirmedRegistration::Rect(_)));
        assert_eq!(confirmed.rect4(), &[[300, 250], [500, 250], [500, 350], [300, 350]]);
        let json = serde_json::to_string(&confirmed).unwrap();
        assert!(json.starts_with(r#"{"rect4":"#));
    }

    #[test]
    fn reset_restores_seed_and_clears_pairs() {
        let mut s = loaded();
        let seeded = s.controller().quad().corners();
        s.controller_mut().pointer_down(Point::new(400.0, 300.0));
        s.controller_mut().pointer_move(Point::new(123.0, 45.0));
        s.controller_mut().pointer_up();
        s.add_correspondence(Point::new(0.0, 0.0), Point::new(1.0, 1.0)).unwrap();
        s.reset();
        assert_eq!(s.controller().quad().corners(), seeded);
        assert!(s.correspondences().is_empty());
    }

    // --- projective mode ---

    fn add_rectangle_pairs(s: &mut RegistrationSession) {
        let pairs = [
            (Point::new(0.0, 50.0), Point::new(150.0, 125.0)),
            (Point::new(100.0, 50.0), Point::new(250.0, 125.0)),
            (Point::new(100.0, 0.0), Point::new(250.0, 175.0)),
            (Point::new(0.0, 0.0), Point::new(150.0, 175.0)),
        ];
        for (step, (geo, px)) in pairs.into_iter().enumerate() {
            assert_eq!(s.add_correspondence(geo, px).unwrap(), step);
        }
    }

    #[test]
    fn projective_mode_needs_four_pairs() {
        let mut s = loaded();
        s.set_mode(RegistrationMode::Projective);
        s.add_correspondence(Point::new(0.0, 0.0), Point::new(1.0, 1.0)).unwrap();
        let err = s.transform().unwrap_err();
        assert!(matches!(err, RegistrationError::IncompleteCorrespondences { have: 1 }));
        assert!(s.overlay().is_err());
        assert!(s.confirm().is_err());
    }

    #[test]
    fn projective_confirm_emits_legacy_descriptor() {
        let mut s = loaded();
        s.set_mode(RegistrationMode::Projective);
        add_rectangle_pairs(&mut s);
        assert!(s.solution().unwrap().max_residual_px < 1e-6);

        let overlay = s.overlay().unwrap();
        assert!(overlay.iter().all(|l| l.complete));
        assert_close(overlay[1].polyline.points()[0], Point::new(200.0, 150.0));

        let confirmed = s.confirm().unwrap();
        assert!(matches!(confirmed, ConfirmedRegistration::Legacy(_)));
        assert_eq!(confirmed.rect4(), &[[300, 250], [500, 250], [500, 350], [300, 350]]);
        let json = serde_json::to_value(confirmed).unwrap();
        assert_eq!(json["bounds"]["xmax"], 100.0);
    }

    #[test]
    fn fifth_pair_is_rejected_until_undo() {
        let mut s = loaded();
        add_rectangle_pairs(&mut s);
        let err = s
            .add_correspondence(Point::new(1.0, 1.0), Point::new(2.0, 2.0))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::CorrespondenceSetFull));

        assert_eq!(s.undo_correspondence().unwrap().step, 3);
        assert!(s.solution().is_none());
        assert_eq!(s.add_correspondence(Point::new(0.0, 0.0), Point::new(150.0, 175.0)).unwrap(), 3);
        assert!(s.solution().is_some());
    }

    #[test]
    fn degenerate_fourth_pair_is_dropped() {
        let mut s = loaded();
        s.set_mode(RegistrationMode::Projective);
        s.add_correspondence(Point::new(0.0, 0.0), Point::new(0.0, 0.0)).unwrap();
        s.add_correspondence(Point::new(10.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        s.add_correspondence(Point::new(20.0, 0.0), Point::new(20.0, 0.0)).unwrap();
        let err = s
            .add_correspondence(Point::new(0.0, 10.0), Point::new(0.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DegenerateCorrespondence(_)));
        assert_eq!(s.correspondences().len(), 3);
        assert!(s.solution().is_none());
    }

    #[test]
    fn mode_switch_cancels_drag() {
        let mut s = loaded();
        s.controller_mut().pointer_down(Point::new(400.0, 300.0));
        s.set_mode(RegistrationMode::Projective);
        assert_eq!(s.controller().state(), InteractionState::Idle);
        assert_eq!(s.mode(), RegistrationMode::Projective);
    }
}
