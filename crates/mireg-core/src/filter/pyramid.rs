//! Multi-resolution image pyramid.

use burn::tensor::backend::Backend;
use tracing::debug;

use super::downsample::DownsampleFilter;
use super::gaussian::{GaussianFilter, SigmaUnits};
use crate::image::Image;

/// Smoothed and shrunk copies of an image, coarsest level first.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// Builds one level per `(shrink_factor, sigma)` pair. Each level is
    /// smoothed first, then shrunk.
    ///
    /// # Panics
    /// Panics if the schedules differ in length. Registration validates its
    /// schedule before building a pyramid.
    pub fn new(
        input: &Image<B, D>,
        shrink_factors: &[usize],
        smoothing_sigmas: &[f64],
        units: SigmaUnits,
    ) -> Self {
        assert_eq!(
            shrink_factors.len(),
            smoothing_sigmas.len(),
            "schedule lengths must match"
        );

        let images = shrink_factors
            .iter()
            .zip(smoothing_sigmas)
            .map(|(&factor, &sigma)| {
                let smoothed = if sigma > 1e-6 {
                    GaussianFilter::new(vec![sigma]).with_units(units).apply(input)
                } else {
                    input.clone()
                };
                let level = if factor > 1 {
                    DownsampleFilter::new(vec![factor]).apply(&smoothed)
                } else {
                    smoothed
                };
                debug!(factor, sigma, shape = ?level.shape(), "pyramid level");
                level
            })
            .collect();

        Self { images }
    }

    pub fn level(&self, level: usize) -> &Image<B, D> {
        &self.images[level]
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }
}

/// Power-of-two schedule for `levels` levels, e.g. 3 → `[4, 2, 1]` with
/// sigmas `[2, 1, 0]`.
pub fn power_of_two_schedule(levels: usize) -> (Vec<usize>, Vec<f64>) {
    (0..levels)
        .map(|i| {
            let factor = 1usize << (levels - 1 - i);
            let sigma = if factor > 1 { 0.5 * factor as f64 } else { 0.0 };
            (factor, sigma)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Point, Spacing};
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_default_schedule() {
        let (factors, sigmas) = power_of_two_schedule(3);
        assert_eq!(factors, vec![4, 2, 1]);
        assert_eq!(sigmas, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_levels_are_coarse_to_fine() {
        let device = Default::default();
        let image = Image::<Backend, 3>::new(
            Tensor::ones([8, 16, 16], &device),
            Point::origin(),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let pyramid = MultiResolutionPyramid::new(&image, &[4, 2, 1], &[2.0, 1.0, 0.0], SigmaUnits::Physical);
        assert_eq!(pyramid.levels(), 3);
        assert_eq!(pyramid.level(0).shape(), [2, 4, 4]);
        assert_eq!(pyramid.level(1).shape(), [4, 8, 8]);
        assert_eq!(pyramid.level(2).shape(), [8, 16, 16]);
        assert_eq!(pyramid.level(0).spacing(), &Spacing::uniform(4.0));
    }

    #[test]
    #[should_panic(expected = "schedule lengths must match")]
    fn test_mismatched_schedule_panics() {
        let device = Default::default();
        let image = Image::<Backend, 2>::new(
            Tensor::ones([4, 4], &device),
            Point::origin(),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let _ = MultiResolutionPyramid::new(&image, &[2, 1], &[1.0], SigmaUnits::Physical);
    }
}
