//! General affine transform with a fixed center.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::{vector_tensor, CenteredTransform, ParametricTransform, Transform};
use crate::spatial::{Point, Vector};

/// `T(x) = A(x - c) + c + t`.
///
/// Parameters are the matrix `A` in row-major order followed by `t`
/// (`D² + D` values). The center `c` is fixed.
#[derive(Debug, Clone)]
pub struct AffineTransform<B: Backend, const D: usize> {
    matrix: Tensor<B, 2>,
    translation: Tensor<B, 1>,
    center: Tensor<B, 1>,
}

impl<B: Backend, const D: usize> AffineTransform<B, D> {
    pub fn new(matrix: Tensor<B, 2>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    pub fn identity(center: Option<Tensor<B, 1>>, device: &B::Device) -> Self {
        let center = center.unwrap_or_else(|| Tensor::zeros([D], device));
        Self::new(Tensor::eye(D, device), Tensor::zeros([D], device), center)
    }

    pub fn matrix(&self) -> Tensor<B, 2> {
        self.matrix.clone()
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.clone()
    }

    pub fn center(&self) -> Tensor<B, 1> {
        self.center.clone()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for AffineTransform<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let c = self.center.clone().reshape([1, D]);
        let t = self.translation.clone().reshape([1, D]);
        (points - c.clone()).matmul(self.matrix.clone().transpose()) + c + t
    }
}

impl<B: Backend, const D: usize> ParametricTransform<B, D> for AffineTransform<B, D> {
    fn parameters(&self) -> Tensor<B, 1> {
        Tensor::cat(
            vec![self.matrix.clone().reshape([D * D]), self.translation.clone()],
            0,
        )
    }

    fn with_parameters(&self, parameters: Tensor<B, 1>) -> Self {
        let matrix = parameters.clone().slice([0..D * D]).reshape([D, D]);
        let translation = parameters.slice([D * D..D * D + D]);
        Self::new(matrix, translation, self.center.clone())
    }

    fn num_parameters(&self) -> usize {
        D * D + D
    }

    fn name(&self) -> &'static str {
        "AffineTransform"
    }
}

impl<B: Backend, const D: usize> CenteredTransform<B, D> for AffineTransform<B, D> {
    fn from_center_and_translation(
        center: Point<D>,
        translation: Vector<D>,
        device: &B::Device,
    ) -> Self {
        let mut t = [0.0; D];
        for (i, v) in t.iter_mut().enumerate() {
            *v = translation[i];
        }
        Self::new(
            Tensor::eye(D, device),
            vector_tensor(t, device),
            vector_tensor(center.coords(), device),
        )
    }
}
