//! Parameter scales from physical shifts.
//!
//! Parameters of a transform live on different scales (radians next to
//! millimetres). The physical-shift estimator perturbs each parameter by a
//! small amount and measures how far the corners of the sample domain move;
//! the scale is the squared shift per unit of parameter change. Dividing the
//! gradient by these scales makes one unit of step move every parameter by a
//! comparable physical distance.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trait_::ObjectiveFunction;
use crate::error::Result;

/// Parameter perturbation used by the estimator.
pub const SMALL_PARAMETER_VARIATION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalesEstimation {
    #[default]
    PhysicalShift,
    /// All scales equal to one.
    Unit,
}

impl ScalesEstimation {
    pub fn estimate(&self, objective: &dyn ObjectiveFunction, parameters: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::PhysicalShift => estimate_physical_shift_scales(objective, parameters),
            Self::Unit => Ok(vec![1.0; parameters.len()]),
        }
    }
}

/// `scale[i] = (shift_i / δ)^2` with `shift_i` the largest corner
/// displacement caused by perturbing parameter `i` by `δ`.
///
/// Parameters that move nothing get the smallest non-zero scale, or `1` when
/// every shift is zero.
pub fn estimate_physical_shift_scales(objective: &dyn ObjectiveFunction, parameters: &[f64]) -> Result<Vec<f64>> {
    let n = parameters.len();
    let mut shifts = Vec::with_capacity(n);
    for i in 0..n {
        let mut delta = vec![0.0; n];
        delta[i] = SMALL_PARAMETER_VARIATION;
        shifts.push(objective.maximum_physical_shift(parameters, &delta)?);
    }

    let min_nonzero = shifts
        .iter()
        .copied()
        .filter(|&s| s > f64::EPSILON)
        .fold(f64::INFINITY, f64::min);

    let scales: Vec<f64> = shifts
        .iter()
        .map(|&s| {
            let s = if s > f64::EPSILON {
                s
            } else if min_nonzero.is_finite() {
                min_nonzero
            } else {
                SMALL_PARAMETER_VARIATION
            };
            (s / SMALL_PARAMETER_VARIATION).powi(2)
        })
        .collect();

    debug!(?scales, "estimated parameter scales");
    Ok(scales)
}
