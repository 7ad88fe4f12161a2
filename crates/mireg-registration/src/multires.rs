//! Multi-resolution schedule.

use burn::tensor::backend::Backend;
use mireg_core::filter::{power_of_two_schedule, MultiResolutionPyramid, SigmaUnits};
use mireg_core::image::Image;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Shrink factors and smoothing sigmas per level, coarsest level first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiResolutionSchedule {
    pub shrink_factors: Vec<usize>,
    pub smoothing_sigmas: Vec<f64>,
    pub sigma_units: SigmaUnits,
}

impl Default for MultiResolutionSchedule {
    fn default() -> Self {
        Self {
            shrink_factors: vec![4, 2, 1],
            smoothing_sigmas: vec![2.0, 1.0, 0.0],
            sigma_units: SigmaUnits::Physical,
        }
    }
}

impl MultiResolutionSchedule {
    pub fn new(shrink_factors: Vec<usize>, smoothing_sigmas: Vec<f64>) -> Self {
        Self {
            shrink_factors,
            smoothing_sigmas,
            sigma_units: SigmaUnits::Physical,
        }
    }

    /// Power-of-two schedule with `levels` levels.
    pub fn with_levels(levels: usize) -> Self {
        let (shrink_factors, smoothing_sigmas) = power_of_two_schedule(levels);
        Self::new(shrink_factors, smoothing_sigmas)
    }

    pub fn with_sigma_units(mut self, units: SigmaUnits) -> Self {
        self.sigma_units = units;
        self
    }

    pub fn levels(&self) -> usize {
        self.shrink_factors.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.shrink_factors.len() != self.smoothing_sigmas.len() {
            return Err(RegistrationError::invalid_configuration(format!(
                "shrink factors ({}) and smoothing sigmas ({}) must have the same length",
                self.shrink_factors.len(),
                self.smoothing_sigmas.len()
            )));
        }
        if self.shrink_factors.is_empty() {
            return Err(RegistrationError::invalid_configuration("schedule has no levels"));
        }
        if let Some(f) = self.shrink_factors.iter().find(|&&f| f == 0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "shrink factors must be at least 1, got {f}"
            )));
        }
        if let Some(s) = self.smoothing_sigmas.iter().find(|s| !(s.is_finite() && **s >= 0.0)) {
            return Err(RegistrationError::invalid_configuration(format!(
                "smoothing sigmas must be finite and non-negative, got {s}"
            )));
        }
        Ok(())
    }

    /// Pyramid of `image` following this schedule. Call [`validate`] first.
    ///
    /// [`validate`]: Self::validate
    pub fn pyramid<B: Backend, const D: usize>(&self, image: &Image<B, D>) -> MultiResolutionPyramid<B, D> {
        MultiResolutionPyramid::new(image, &self.shrink_factors, &self.smoothing_sigmas, self.sigma_units)
    }
}
