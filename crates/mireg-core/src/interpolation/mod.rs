//! Interpolation of image samples at continuous indices.

pub mod linear;
pub mod nearest;
pub mod trait_;

pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
pub use trait_::Interpolator;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Interpolator selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolatorKind {
    #[default]
    Linear,
    NearestNeighbor,
}

impl<B: Backend> Interpolator<B> for InterpolatorKind {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Self::Linear => LinearInterpolator.interpolate(data, indices),
            Self::NearestNeighbor => NearestNeighborInterpolator.interpolate(data, indices),
        }
    }
}
