//! Nearest neighbor interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::trait_::Interpolator;
use crate::tensor;

/// Picks the closest lattice sample. Piecewise constant, so it carries no
/// gradient with respect to the sample positions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let [n, _] = indices.dims();
        let device = indices.device();
        let coords = tensor::to_vec(indices);

        let offsets: Vec<i64> = (0..n)
            .map(|s| {
                let mut offset = 0usize;
                let mut stride = 1usize;
                for axis in 0..D {
                    let extent = shape[D - 1 - axis];
                    let i = coords[s * D + axis].round().clamp(0.0, (extent - 1) as f32) as usize;
                    offset += i * stride;
                    stride *= extent;
                }
                offset as i64
            })
            .collect();

        let total: usize = shape.iter().product();
        data.clone()
            .reshape([total])
            .select(0, tensor::index_tensor::<B>(offsets, &device))
    }
}
