//! Pointer-driven manipulation of the registration frame.
//!
//! [`InteractionController`] is a small state machine fed with pointer
//! events in display pixels. A drag arms on pointer-down, updates the
//! frame on every move, and ends on pointer-up (which the host should
//! deliver even when the pointer has left the image) or [`cancel`].
//!
//! [`cancel`]: InteractionController::cancel

use serde::{Deserialize, Serialize};

use crate::config::RegistrationConfig;
use crate::quad::{Corner, Quadrilateral};
use crate::transform::local_from_pixel;
use crate::types::Point;

/// What the current drag, if any, is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingCorner(Corner),
    DraggingRotationHandle,
    DraggingWhole,
}

impl InteractionState {
    #[must_use]
    pub const fn is_dragging(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Host hook for window-level pointer listeners.
///
/// [`acquire`](Self::acquire) is called once when a drag arms and
/// [`release`](Self::release) once when it ends, including when the
/// controller is dropped mid-drag.
pub trait PointerCapture {
    fn acquire(&mut self);
    fn release(&mut self);
}

/// Capture for hosts that already route every pointer event to the
/// controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

impl PointerCapture for NoCapture {
    fn acquire(&mut self) {}
    fn release(&mut self) {}
}

/// The frame editor.
#[derive(Debug)]
pub struct InteractionController<C: PointerCapture = NoCapture> {
    config: RegistrationConfig,
    seed: Quadrilateral,
    quad: Quadrilateral,
    state: InteractionState,
    /// Frame as it was when the current drag armed.
    anchor: Quadrilateral,
    /// `pointer - center` at the start of a whole-frame drag.
    grab_offset: Point,
    ready: bool,
    capture: C,
    captured: bool,
}

impl InteractionController<NoCapture> {
    /// Controller without pointer capture, starting at `seed`.
    #[must_use]
    pub const fn new(config: RegistrationConfig, seed: Quadrilateral) -> Self {
        Self::with_capture(config, seed, NoCapture)
    }
}

impl<C: PointerCapture> InteractionController<C> {
    /// Controller that reports drag boundaries to `capture`.
    #[must_use]
    pub const fn with_capture(config: RegistrationConfig, seed: Quadrilateral, capture: C) -> Self {
        Self {
            config,
            seed,
            quad: seed,
            state: InteractionState::Idle,
            anchor: seed,
            grab_offset: Point::new(0.0, 0.0),
            ready: false,
            capture,
            captured: false,
        }
    }

    /// The live frame.
    #[must_use]
    pub const fn quad(&self) -> &Quadrilateral {
        &self.quad
    }

    /// The frame [`reset`](Self::reset) returns to.
    #[must_use]
    pub const fn seed_quad(&self) -> &Quadrilateral {
        &self.seed
    }

    #[must_use]
    pub const fn state(&self) -> InteractionState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    #[must_use]
    pub const fn capture(&self) -> &C {
        &self.capture
    }

    /// Mark whether the image's natural and display sizes are known.
    ///
    /// Pointer-down is ignored until this is `true`. Becoming not ready
    /// mid-drag ends the drag.
    pub fn set_ready(&mut self, ready: bool) {
        if !ready {
            self.end_drag();
        }
        self.ready = ready;
    }

    /// Replace both the live frame and the reset target, ending any drag.
    pub fn seed(&mut self, quad: Quadrilateral) {
        self.end_drag();
        self.seed = quad;
        self.quad = quad;
    }

    /// Restore the seeded frame exactly, ending any drag.
    pub fn reset(&mut self) {
        self.end_drag();
        self.quad = self.seed;
    }

    /// Start a drag if `pixel` hits the rotation handle, a corner, or the
    /// frame body, checked in that order.
    ///
    /// Returns the new state, or `None` if nothing was hit, a drag is
    /// already in progress, or the image is not ready.
    pub fn pointer_down(&mut self, pixel: Point) -> Option<InteractionState> {
        if !self.ready || self.state.is_dragging() {
            return None;
        }
        let state = self.hit_test(pixel)?;
        if state == InteractionState::DraggingWhole {
            self.grab_offset = pixel.offset(-self.quad.center_x, -self.quad.center_y);
        }
        self.anchor = self.quad;
        self.state = state;
        if !self.captured {
            self.capture.acquire();
            self.captured = true;
        }
        log::debug!("drag armed: {state:?} at ({:.1}, {:.1})", pixel.x, pixel.y);
        Some(state)
    }

    fn hit_test(&self, pixel: Point) -> Option<InteractionState> {
        let radius_sq = self.config.handle_radius * self.config.handle_radius;
        let handle = self.quad.rotation_handle(self.config.rotation_handle_offset);
        if pixel.distance_squared(handle) <= radius_sq {
            return Some(InteractionState::DraggingRotationHandle);
        }
        let nearest = Corner::ALL
            .into_iter()
            .map(|c| (c, pixel.distance_squared(self.quad.corner(c))))
            .filter(|&(_, d)| d <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((corner, _)) = nearest {
            return Some(InteractionState::DraggingCorner(corner));
        }
        self.quad
            .contains(pixel)
            .then_some(InteractionState::DraggingWhole)
    }

    /// Apply a pointer move. Returns `true` if the frame changed.
    pub fn pointer_move(&mut self, pixel: Point) -> bool {
        let next = match self.state {
            InteractionState::Idle => return false,
            InteractionState::DraggingCorner(corner) => self.resized(corner, pixel),
            InteractionState::DraggingRotationHandle => Quadrilateral {
                rotation_degrees: rotation_toward(self.quad.center(), pixel),
                ..self.quad
            },
            InteractionState::DraggingWhole => Quadrilateral {
                center_x: pixel.x - self.grab_offset.x,
                center_y: pixel.y - self.grab_offset.y,
                ..self.quad
            },
        };
        let changed = next != self.quad;
        self.quad = next;
        changed
    }

    /// Frame with `corner` moved toward `pixel` and its opposite corner
    /// held fixed, in the pre-drag frame's axes.
    fn resized(&self, corner: Corner, pixel: Point) -> Quadrilateral {
        let anchor = &self.anchor;
        let min = self.config.min_size;
        let (sx, sy) = corner.signs();
        let local = local_from_pixel(pixel, anchor);
        let fixed = Point::new(-sx * anchor.width / 2.0, -sy * anchor.height / 2.0);

        let width = (sx * (local.x - fixed.x)).max(min);
        let height = (sy * (local.y - fixed.y)).max(min);
        let local_center = fixed.offset(sx * width / 2.0, sy * height / 2.0);
        let center = anchor.pixel_from_local(local_center);

        Quadrilateral::new(center.x, center.y, width, height, anchor.rotation_degrees)
    }

    /// End the drag, keeping the frame where it is.
    ///
    /// Returns `true` if a drag was in progress.
    pub fn pointer_up(&mut self) -> bool {
        self.end_drag()
    }

    /// Abandon the drag and restore the frame it started from.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.end_drag();
        if was_dragging {
            self.quad = self.anchor;
        }
        was_dragging
    }

    fn end_drag(&mut self) -> bool {
        let was_dragging = self.state.is_dragging();
        if was_dragging {
            log::debug!("drag ended: {:?}", self.state);
        }
        self.state = InteractionState::Idle;
        if self.captured {
            self.capture.release();
            self.captured = false;
        }
        was_dragging
    }
}

impl<C: PointerCapture> Drop for InteractionController<C> {
    fn drop(&mut self) {
        self.end_drag();
    }
}

/// Rotation that puts the frame's local "up" axis on the ray from
/// `center` through `pixel`.
///
/// This is `atan2(dy, dx)` in degrees plus 90: the raw angle is measured
/// from +X, the frame's up axis sits at -90 on screen, so a pointer
/// resting on the rotation handle yields the current rotation.
fn rotation_toward(center: Point, pixel: Point) -> f64 {
    (pixel.y - center.y).atan2(pixel.x - center.x).to_degrees() + 90.0
}
