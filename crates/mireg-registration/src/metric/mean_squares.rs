//! Mean squares metric.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use mireg_core::image::Image;
use mireg_core::interpolation::Interpolator;
use mireg_core::tensor;
use mireg_core::transform::Transform;
use serde::{Deserialize, Serialize};

use super::trait_::{map_samples, Metric};
use crate::error::Result;
use crate::sampling::SampleSet;

/// Mean squared intensity difference over the overlapping samples:
/// `MS = (1/N) * sum((F(x) - M(T(x)))^2)`.
///
/// Only meaningful for images of the same modality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanSquares;

impl MeanSquares {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend, const D: usize> Metric<B, D> for MeanSquares {
    fn initialize(&mut self, _fixed: &Image<B, D>, _moving: &Image<B, D>) -> Result<()> {
        Ok(())
    }

    fn evaluate<T, I>(
        &self,
        samples: &SampleSet<B>,
        moving: &Image<B, D>,
        transform: &T,
        interpolator: &I,
    ) -> Result<Tensor<B, 1>>
    where
        T: Transform<B, D>,
        I: Interpolator<B>,
    {
        let mapped = map_samples(samples, moving, transform, interpolator)?;
        let n = mapped.len();
        let fixed = tensor::from_vec::<B, 1>(mapped.fixed_values, [n], &mapped.moving_values.device());
        let diff = mapped.moving_values - fixed;
        Ok((diff.clone() * diff).mean())
    }

    fn name(&self) -> &'static str {
        "MeanSquares"
    }
}
