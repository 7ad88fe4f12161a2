//! Selection of the fixed-image points at which the metric is evaluated.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use mireg_core::image::{generate_grid, unravel_index, Image};
use mireg_core::interpolation::{Interpolator, LinearInterpolator};
use mireg_core::tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::validation::validate_sampling_percentage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Every voxel of the fixed image.
    None,
    /// Every k-th voxel in memory order, `k = round(1 / percentage)`.
    Regular,
    /// Uniformly drawn voxels, each jittered within its voxel. Redrawn at
    /// every metric evaluation.
    #[default]
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub strategy: SamplingStrategy,
    /// Fraction of the fixed voxels to sample, in `(0, 1]`.
    pub percentage: f64,
    /// Fixes the random stream. Without a seed every run draws different
    /// samples.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::Random,
            percentage: 0.01,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        validate_sampling_percentage(self.percentage)
    }
}

/// Fixed-image samples for one metric evaluation.
#[derive(Debug, Clone)]
pub struct SampleSet<B: Backend> {
    /// Physical positions, `[N, D]`.
    pub points: Tensor<B, 2>,
    /// Fixed intensities at `points`.
    pub fixed_values: Vec<f32>,
}

impl<B: Backend> SampleSet<B> {
    pub fn len(&self) -> usize {
        self.fixed_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_values.is_empty()
    }
}

/// Draws sample sets according to a [`SamplingConfig`]. One sampler lives
/// for a whole registration, so a seeded run is reproducible across levels.
pub struct ImageSampler {
    strategy: SamplingStrategy,
    percentage: f64,
    rng: StdRng,
}

impl ImageSampler {
    pub fn new(config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            strategy: config.strategy,
            percentage: config.percentage,
            rng,
        }
    }

    /// Number of samples drawn from an image with `total` voxels.
    pub fn sample_count(&self, total: usize) -> usize {
        match self.strategy {
            SamplingStrategy::None => total,
            SamplingStrategy::Regular => total.div_ceil(self.regular_step()),
            SamplingStrategy::Random => ((total as f64 * self.percentage).floor() as usize).clamp(1, total.max(1)),
        }
    }

    fn regular_step(&self) -> usize {
        ((1.0 / self.percentage).round() as usize).max(1)
    }

    pub fn sample<B: Backend, const D: usize>(&mut self, fixed: &Image<B, D>) -> SampleSet<B> {
        let device = fixed.device();
        let shape = fixed.shape();
        let total = fixed.num_voxels();

        let (indices, fixed_values) = match self.strategy {
            SamplingStrategy::None => (generate_grid::<B, D>(shape, &device), fixed.to_vec()),
            SamplingStrategy::Regular => {
                let values = fixed.to_vec();
                let step = self.regular_step();
                let mut coords = Vec::with_capacity(self.sample_count(total) * D);
                let mut picked = Vec::with_capacity(self.sample_count(total));
                for flat in (0..total).step_by(step) {
                    coords.extend(unravel_index(flat, shape).iter().map(|&i| i as f32));
                    picked.push(values[flat]);
                }
                let n = picked.len();
                (tensor::from_vec(coords, [n, D], &device), picked)
            }
            SamplingStrategy::Random => {
                let n = self.sample_count(total);
                let size = fixed.size();
                let mut coords = Vec::with_capacity(n * D);
                for _ in 0..n {
                    let voxel = unravel_index(self.rng.gen_range(0..total), shape);
                    for axis in 0..D {
                        let jitter: f64 = self.rng.gen_range(-0.5..0.5);
                        let upper = (size[axis] - 1) as f64;
                        coords.push((voxel[axis] as f64 + jitter).clamp(0.0, upper) as f32);
                    }
                }
                let indices = tensor::from_vec::<B, 2>(coords, [n, D], &device);
                let values = tensor::to_vec(LinearInterpolator.interpolate(fixed.data(), indices.clone()));
                (indices, values)
            }
        };

        debug!(strategy = ?self.strategy, samples = fixed_values.len(), total, "drew metric samples");
        SampleSet {
            points: fixed.index_to_world_tensor(indices),
            fixed_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use mireg_core::spatial::{Direction, Point, Spacing};

    type B = NdArray<f32>;

    fn ramp() -> Image<B, 3> {
        let device = Default::default();
        let values: Vec<f32> = (0..1000).map(|v| v as f32).collect();
        Image::new(
            tensor::from_vec(values, [10, 10, 10], &device),
            Point::new([5.0, 0.0, 0.0]),
            Spacing::uniform(2.0),
            Direction::identity(),
        )
    }

    fn config(strategy: SamplingStrategy, percentage: f64, seed: Option<u64>) -> SamplingConfig {
        SamplingConfig {
            strategy,
            percentage,
            seed,
        }
    }

    #[test]
    fn test_default_is_one_percent_random() {
        let c = SamplingConfig::default();
        assert_eq!(c.strategy, SamplingStrategy::Random);
        assert_eq!(c.percentage, 0.01);
        assert_eq!(c.seed, None);
    }

    #[test]
    fn test_full_sampling_covers_every_voxel() {
        let image = ramp();
        let mut sampler = ImageSampler::new(&config(SamplingStrategy::None, 1.0, None));
        let samples = sampler.sample(&image);
        assert_eq!(samples.len(), 1000);
        assert_eq!(samples.points.dims(), [1000, 3]);
        assert_eq!(samples.fixed_values[123], 123.0);
    }

    #[test]
    fn test_regular_sampling_step() {
        let image = ramp();
        let mut sampler = ImageSampler::new(&config(SamplingStrategy::Regular, 0.1, None));
        let samples = sampler.sample(&image);
        assert_eq!(samples.len(), 100);
        assert_eq!(&samples.fixed_values[..3], &[0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_random_sampling_is_reproducible_with_seed() {
        let image = ramp();
        let c = config(SamplingStrategy::Random, 0.05, Some(7));
        let a = ImageSampler::new(&c).sample(&image);
        let b = ImageSampler::new(&c).sample(&image);
        assert_eq!(a.len(), 50);
        assert_eq!(a.fixed_values, b.fixed_values);

        // Consecutive draws from one sampler differ.
        let mut sampler = ImageSampler::new(&c);
        let first = sampler.sample(&image);
        let second = sampler.sample(&image);
        assert_ne!(first.fixed_values, second.fixed_values);
    }

    #[test]
    fn test_random_points_stay_inside_the_image() {
        let image = ramp();
        let mut sampler = ImageSampler::new(&config(SamplingStrategy::Random, 0.2, Some(1)));
        let points = tensor::to_vec(sampler.sample(&image).points);
        // Physical extent along x: origin 5, 10 samples at spacing 2.
        for p in points.chunks_exact(3) {
            assert!(p[0] >= 5.0 - 1e-4 && p[0] <= 23.0 + 1e-4);
            assert!(p[1] >= -1e-4 && p[1] <= 18.0 + 1e-4);
        }
    }

    #[test]
    fn test_tiny_percentage_draws_at_least_one_sample() {
        let sampler = ImageSampler::new(&config(SamplingStrategy::Random, 1e-6, None));
        assert_eq!(sampler.sample_count(1000), 1);
    }
}
