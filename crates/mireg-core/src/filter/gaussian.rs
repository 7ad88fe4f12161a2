//! Separable Gaussian smoothing.

use burn::tensor::backend::Backend;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::spatial::Spacing;

/// Unit of a smoothing sigma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaUnits {
    /// Millimetres; divided by the spacing of each axis.
    #[default]
    Physical,
    /// Voxels.
    Voxel,
}

/// Gaussian smoothing with separable 1D convolutions.
///
/// Sigmas are given per geometric axis in `(x, y, z)` order; a single value
/// applies to every axis. Borders replicate the edge sample so smoothing does
/// not darken the image boundary.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    units: SigmaUnits,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            units: SigmaUnits::Physical,
            max_kernel_width: 32,
            _b: std::marker::PhantomData,
        }
    }

    pub fn with_units(mut self, units: SigmaUnits) -> Self {
        self.units = units;
        self
    }

    /// Upper bound on `2 * radius + 1`.
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        image.with_data(self.apply_tensor(image.data().clone(), image.spacing()))
    }

    /// Smooths a raw `[z, y, x]` tensor whose axes have the given spacing.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let sigma = self
                .sigmas
                .get(axis)
                .or_else(|| self.sigmas.first())
                .copied()
                .unwrap_or(0.0);
            if sigma <= 1e-6 {
                continue;
            }

            let voxel_sigma = match self.units {
                SigmaUnits::Physical => sigma / spacing[axis],
                SigmaUnits::Voxel => sigma,
            };
            let radius = (3.0 * voxel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let radius = (width - 1) / 2;
            if radius == 0 {
                continue;
            }

            let kernel = gaussian_kernel(voxel_sigma, radius);
            let kernel = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = convolve_along(data, kernel, dim, radius);
        }
        data
    }
}

/// Sampled, normalized Gaussian of the given radius.
fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// 1D convolution along tensor dimension `dim` with edge replication.
fn convolve_along<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    kernel: Tensor<B, 1>,
    dim: usize,
    radius: usize,
) -> Tensor<B, D> {
    let dims = input.dims();

    // Move the filtered dimension last and flatten the rest into the batch.
    let mut perm = [0isize; D];
    let mut next = 0;
    for i in (0..D).filter(|&i| i != dim) {
        perm[next] = i as isize;
        next += 1;
    }
    perm[D - 1] = dim as isize;

    let length = dims[dim];
    let batch: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
    let lines = input.permute(perm).reshape([batch, 1, length]);

    let first = lines.clone().slice([0..batch, 0..1, 0..1]);
    let last = lines.clone().slice([0..batch, 0..1, length - 1..length]);
    let mut parts = vec![first; radius];
    parts.push(lines);
    parts.extend(std::iter::repeat(last).take(radius));
    let padded = Tensor::cat(parts, 2);

    let kernel = kernel.reshape([1, 1, 2 * radius + 1]);
    let out = conv1d(padded, kernel, None, ConvOptions::new([1], [0], [1], 1));

    let mut permuted_shape = [0usize; D];
    for (slot, &p) in permuted_shape.iter_mut().zip(perm.iter()) {
        *slot = dims[p as usize];
    }
    let mut inverse = [0isize; D];
    for (new_pos, &old_pos) in perm.iter().enumerate() {
        inverse[old_pos as usize] = new_pos as isize;
    }
    out.reshape(permuted_shape).permute(inverse)
}
