//! Automatic learning-rate estimation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::trait_::ObjectiveFunction;
use crate::error::Result;

/// When the optimizer re-derives its learning rate from the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateLearningRate {
    /// Keep the configured learning rate.
    Never,
    /// Estimate at the first iteration of every optimization run (every
    /// pyramid level).
    #[default]
    Once,
    EachIteration,
}

/// Learning rate that makes `direction` move the domain by exactly
/// `maximum_step`: `lr = maximum_step / shift(direction)`.
///
/// A direction that does not move anything yields `1.0`.
pub fn estimate_learning_rate(
    objective: &dyn ObjectiveFunction,
    parameters: &[f64],
    direction: &[f64],
    maximum_step: f64,
) -> Result<f64> {
    let shift = objective.maximum_physical_shift(parameters, direction)?;
    if shift > f64::EPSILON && shift.is_finite() {
        Ok(maximum_step / shift)
    } else {
        warn!(shift, "gradient does not move the domain, falling back to a unit learning rate");
        Ok(1.0)
    }
}
