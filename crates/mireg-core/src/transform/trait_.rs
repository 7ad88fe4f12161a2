//! Transform traits.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::spatial::{Point, Vector};
use crate::tensor;

/// Maps points from one physical space to another.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply the transform to a `[N, D]` batch of physical points.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// A transform described by a flat parameter vector.
///
/// Optimizers never mutate a transform. They read its parameters, compute a
/// new vector and build a fresh instance with [`with_parameters`], so the
/// caller's transform stays valid. Fixed quantities such as the rotation
/// center are carried over unchanged.
///
/// [`with_parameters`]: ParametricTransform::with_parameters
pub trait ParametricTransform<B: Backend, const D: usize>: Transform<B, D> + Clone {
    /// Current parameters as a rank-1 tensor.
    fn parameters(&self) -> Tensor<B, 1>;

    /// A copy of this transform with its parameters replaced.
    ///
    /// The tensor may carry autodiff state; the returned transform then
    /// produces outputs differentiable with respect to it.
    fn with_parameters(&self, parameters: Tensor<B, 1>) -> Self;

    fn num_parameters(&self) -> usize;

    fn name(&self) -> &'static str;

    /// Parameters copied to the host.
    fn parameter_values(&self) -> Vec<f64> {
        tensor::to_vec(self.parameters())
            .into_iter()
            .map(f64::from)
            .collect()
    }

    fn with_parameter_values(&self, values: &[f64]) -> Self {
        let device = self.parameters().device();
        let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let len = values.len();
        self.with_parameters(tensor::from_vec(values, [len], &device))
    }
}

/// Transforms that can be built from a rotation center and a translation,
/// which is what centered initialization produces.
pub trait CenteredTransform<B: Backend, const D: usize>: Sized {
    fn from_center_and_translation(
        center: Point<D>,
        translation: Vector<D>,
        device: &B::Device,
    ) -> Self;
}

pub(crate) fn vector_tensor<B: Backend, const D: usize>(
    values: [f64; D],
    device: &B::Device,
) -> Tensor<B, 1> {
    tensor::from_vec(values.iter().map(|&v| v as f32).collect(), [D], device)
}
