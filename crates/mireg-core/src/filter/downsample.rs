//! Integer shrinking by subsampling.

use burn::tensor::backend::Backend;

use crate::image::Image;
use crate::tensor;

/// Keeps every `factor`-th sample along each axis and scales the spacing
/// accordingly. The first sample, and therefore the origin, is unchanged.
///
/// Factors are per geometric axis in `(x, y, z)` order; a single value
/// applies to every axis.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    fn factor(&self, axis: usize) -> usize {
        self.factors
            .get(axis)
            .or_else(|| self.factors.first())
            .copied()
            .unwrap_or(1)
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims = data.dims();
        let mut spacing = *image.spacing();

        for dim in 0..D {
            let axis = D - 1 - dim;
            let factor = self.factor(axis);
            if factor <= 1 {
                continue;
            }
            let kept: Vec<i64> = (0..dims[dim]).step_by(factor).map(|i| i as i64).collect();
            data = data.select(dim, tensor::index_tensor::<B>(kept, &device));
            spacing[axis] *= factor as f64;
        }

        Image::new(data, *image.origin(), spacing, *image.direction())
    }
}
