//! Interpolator trait for sampling values at continuous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Samples a tensor at continuous indices.
///
/// Indices are `[N, D]` in `(x, y, z)` column order while `data` is laid out
/// `[z, y, x]`. Coordinates outside the grid are clamped to the border;
/// callers that need to know which samples fell outside check that
/// themselves before interpolating.
pub trait Interpolator<B: Backend> {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
