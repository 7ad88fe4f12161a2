//! Index grids over an image's voxel lattice.
//!
//! Tensors store samples in `[z, y, x]` order while continuous indices are
//! written as `(x, y, z)` columns. These helpers convert between a flat
//! row-major offset and an `(x, y, z)` index for any dimensionality.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// Splits a flat row-major offset into an `(x, y, z)` index.
///
/// `shape` is the tensor shape (`[z, y, x]` for 3D).
pub fn unravel_index<const D: usize>(flat: usize, shape: [usize; D]) -> [usize; D] {
    let mut index = [0usize; D];
    let mut rem = flat;
    for (axis, slot) in index.iter_mut().enumerate() {
        let extent = shape[D - 1 - axis];
        *slot = rem % extent;
        rem /= extent;
    }
    index
}

/// Inverse of [`unravel_index`].
pub fn ravel_index<const D: usize>(index: [usize; D], shape: [usize; D]) -> usize {
    let mut flat = 0usize;
    let mut stride = 1usize;
    for (axis, i) in index.iter().enumerate() {
        flat += i * stride;
        stride *= shape[D - 1 - axis];
    }
    flat
}

/// Continuous indices of every voxel, as a `[N, D]` tensor in row-major
/// voxel order.
pub fn generate_grid<B: Backend, const D: usize>(
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, 2> {
    let total: usize = shape.iter().product();
    let mut grid = Vec::with_capacity(total * D);
    for flat in 0..total {
        grid.extend(unravel_index(flat, shape).iter().map(|&i| i as f32));
    }
    Tensor::from_data(TensorData::new(grid, [total, D]), device)
}
