//! Tunable parameters for interactive registration.

use serde::{Deserialize, Serialize};

use crate::types::RegistrationError;

/// Configuration shared by the quadrilateral model, the interaction
/// controller, and the homography solver.
///
/// Every field has a `DEFAULT_*` associated constant so front ends (e.g.
/// CLI flag defaults) cannot silently diverge from [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Smallest width and height the registration frame may shrink to,
    /// in display pixels.
    pub min_size: f64,

    /// Pointer distance (display pixels) within which a corner or the
    /// rotation handle counts as hit.
    pub handle_radius: f64,

    /// Distance from the rotated top-midpoint to the rotation handle, in
    /// display pixels.
    pub rotation_handle_offset: f64,

    /// Fraction of the limiting display dimension a freshly fitted frame
    /// occupies (0.0 exclusive to 1.0 inclusive).
    pub fit_fraction: f64,

    /// Relative triangle area below which three correspondence points are
    /// treated as collinear.
    pub collinearity_tolerance: f64,
}

impl RegistrationConfig {
    pub const DEFAULT_MIN_SIZE: f64 = 40.0;
    pub const DEFAULT_HANDLE_RADIUS: f64 = 10.0;
    pub const DEFAULT_ROTATION_HANDLE_OFFSET: f64 = 30.0;
    pub const DEFAULT_FIT_FRACTION: f64 = 0.8;
    pub const DEFAULT_COLLINEARITY_TOLERANCE: f64 = 1e-6;

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(RegistrationError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };
        positive("min_size", self.min_size)?;
        positive("handle_radius", self.handle_radius)?;
        positive("collinearity_tolerance", self.collinearity_tolerance)?;
        if !(self.rotation_handle_offset.is_finite() && self.rotation_handle_offset >= 0.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "rotation_handle_offset must be non-negative, got {}",
                self.rotation_handle_offset
            )));
        }
        if !(self.fit_fraction > 0.0 && self.fit_fraction <= 1.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "fit_fraction must be in (0, 1], got {}",
                self.fit_fraction
            )));
        }
        Ok(())
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            min_size: Self::DEFAULT_MIN_SIZE,
            handle_radius: Self::DEFAULT_HANDLE_RADIUS,
            rotation_handle_offset: Self::DEFAULT_ROTATION_HANDLE_OFFSET,
            fit_fraction: Self::DEFAULT_FIT_FRACTION,
            collinearity_tolerance: Self::DEFAULT_COLLINEARITY_TOLERANCE,
        }
    }
}
