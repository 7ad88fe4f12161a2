//! Multilinear interpolation (bilinear in 2D, trilinear in 3D).

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::trait_::Interpolator;
use crate::tensor;

/// Multilinear interpolator.
///
/// Lattice lookups are resolved on the host (floor, clamp, flat offsets)
/// and the 2^D corner values are gathered on the device. The fractional
/// weights stay tensor expressions of `indices`, so the result is
/// differentiable with respect to the sample positions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let [n, _] = indices.dims();
        let device = indices.device();
        let coords = tensor::to_vec(indices.clone());

        // Lower corner per sample and axis, clamped so the upper corner is
        // still inside the lattice.
        let mut lower = vec![0usize; n * D];
        let mut lower_f = vec![0f32; n * D];
        for s in 0..n {
            for axis in 0..D {
                let extent = shape[D - 1 - axis];
                let max_lower = extent.saturating_sub(2) as f32;
                let f = coords[s * D + axis].floor().clamp(0.0, max_lower);
                lower[s * D + axis] = f as usize;
                lower_f[s * D + axis] = f;
            }
        }

        let lower_t = tensor::from_vec::<B, 2>(lower_f, [n, D], &device);
        let frac = (indices - lower_t).clamp(0.0, 1.0);
        let weights: Vec<Tensor<B, 1>> = (0..D)
            .map(|axis| frac.clone().slice([0..n, axis..axis + 1]).reshape([n]))
            .collect();

        let total: usize = shape.iter().product();
        let flat = data.clone().reshape([total]);

        let mut result = Tensor::<B, 1>::zeros([n], &device);
        for corner in 0..(1usize << D) {
            let mut offsets = Vec::with_capacity(n);
            for s in 0..n {
                let mut offset = 0usize;
                let mut stride = 1usize;
                for axis in 0..D {
                    let extent = shape[D - 1 - axis];
                    let step = (corner >> axis) & 1;
                    let i = (lower[s * D + axis] + step).min(extent - 1);
                    offset += i * stride;
                    stride *= extent;
                }
                offsets.push(offset as i64);
            }
            let values = flat.clone().select(0, tensor::index_tensor::<B>(offsets, &device));

            let mut weight = Tensor::<B, 1>::ones([n], &device);
            for (axis, w) in weights.iter().enumerate() {
                weight = if (corner >> axis) & 1 == 1 {
                    weight * w.clone()
                } else {
                    weight * (w.clone().neg() + 1.0)
                };
            }
            result = result + values * weight;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{from_vec, to_vec};
    use burn::tensor::ElementConversion;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;
    type AutodiffBackend = burn::backend::Autodiff<NdArray<f32>>;

    #[test]
    fn test_exact_at_grid_points() {
        let device = Default::default();
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let data = from_vec::<TestBackend, 3>(values, [2, 3, 4], &device);
        // (x=3, y=2, z=1) -> 1*12 + 2*4 + 3
        let idx = Tensor::<TestBackend, 2>::from_floats([[3.0, 2.0, 1.0], [0.0, 0.0, 0.0]], &device);
        let out = to_vec(LinearInterpolator.interpolate(&data, idx));
        assert_eq!(out, vec![23.0, 0.0]);
    }

    #[test]
    fn test_linear_ramp_is_reproduced() {
        let device = Default::default();
        // value = 2x + 10y on a 4x4 grid
        let values: Vec<f32> = (0..16).map(|i| (2 * (i % 4) + 10 * (i / 4)) as f32).collect();
        let data = from_vec::<TestBackend, 2>(values, [4, 4], &device);
        let idx = Tensor::<TestBackend, 2>::from_floats([[1.5, 0.25], [2.75, 2.5]], &device);
        let out = to_vec(LinearInterpolator.interpolate(&data, idx));
        assert!((out[0] - 5.5).abs() < 1e-5);
        assert!((out[1] - 30.5).abs() < 1e-5);
    }

    #[test]
    fn test_upper_border_is_exact() {
        let device = Default::default();
        let data = from_vec::<TestBackend, 1>(vec![1.0, 2.0, 4.0], [3], &device);
        let idx = Tensor::<TestBackend, 2>::from_floats([[2.0], [7.0], [-3.0]], &device);
        assert_eq!(to_vec(LinearInterpolator.interpolate(&data, idx)), vec![4.0, 4.0, 1.0]);
    }

    #[test]
    fn test_gradient_with_respect_to_position() {
        let device = Default::default();
        let data = from_vec::<AutodiffBackend, 1>(vec![0.0, 3.0, 6.0, 9.0], [4], &device);
        let idx = Tensor::<AutodiffBackend, 2>::from_floats([[1.25]], &device).require_grad();
        let out = LinearInterpolator.interpolate(&data, idx.clone()).sum();
        let grads = out.backward();
        let g = idx.grad(&grads).map(|g| g.into_scalar().elem::<f32>());
        assert_eq!(g, Some(3.0));
    }
}
