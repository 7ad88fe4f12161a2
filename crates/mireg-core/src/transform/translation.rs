//! Pure translation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::{vector_tensor, CenteredTransform, ParametricTransform, Transform};
use crate::spatial::{Point, Vector};

/// `T(x) = x + t`. Parameters: `[t_x, t_y, (t_z)]`.
#[derive(Debug, Clone)]
pub struct TranslationTransform<B: Backend, const D: usize> {
    translation: Tensor<B, 1>,
}

impl<B: Backend, const D: usize> TranslationTransform<B, D> {
    pub fn new(translation: Tensor<B, 1>) -> Self {
        Self { translation }
    }

    pub fn identity(device: &B::Device) -> Self {
        Self::new(Tensor::zeros([D], device))
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.clone()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for TranslationTransform<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points + self.translation.clone().reshape([1, D])
    }
}

impl<B: Backend, const D: usize> ParametricTransform<B, D> for TranslationTransform<B, D> {
    fn parameters(&self) -> Tensor<B, 1> {
        self.translation.clone()
    }

    fn with_parameters(&self, parameters: Tensor<B, 1>) -> Self {
        Self::new(parameters)
    }

    fn num_parameters(&self) -> usize {
        D
    }

    fn name(&self) -> &'static str {
        "TranslationTransform"
    }
}

impl<B: Backend, const D: usize> CenteredTransform<B, D> for TranslationTransform<B, D> {
    fn from_center_and_translation(
        _center: Point<D>,
        translation: Vector<D>,
        device: &B::Device,
    ) -> Self {
        let mut t = [0.0; D];
        for (i, v) in t.iter_mut().enumerate() {
            *v = translation[i];
        }
        Self::new(vector_tensor(t, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::to_vec;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_translation_transform() {
        let device = Default::default();
        let translation = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0], &device);
        let transform = TranslationTransform::<TestBackend, 3>::new(translation);
        let points = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], &device);

        let out = to_vec(transform.transform_points(points));
        assert_eq!(out, vec![1.0, 2.0, 3.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_with_parameters_leaves_original_untouched() {
        let device = Default::default();
        let original = TranslationTransform::<TestBackend, 2>::identity(&device);
        let moved = original.with_parameter_values(&[4.0, -1.0]);
        assert_eq!(original.parameter_values(), vec![0.0, 0.0]);
        assert_eq!(moved.parameter_values(), vec![4.0, -1.0]);
        assert_eq!(moved.num_parameters(), 2);
    }
}
