//! Mattes mutual information.
//!
//! Joint intensity histogram built from a random subset of fixed samples
//! (Mattes et al., "PET-CT image registration in the chest using free-form
//! deformations", IEEE TMI 2003):
//!
//! * the fixed contribution of a sample is a hard (zero-order) bin,
//! * the moving contribution is spread over neighbouring bins with a cubic
//!   B-spline Parzen window, which makes the histogram differentiable with
//!   respect to the transform parameters.
//!
//! Two bins of padding on each side keep the Parzen window inside the
//! histogram. The loss is `-MI`, so better alignment gives lower values.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use mireg_core::image::Image;
use mireg_core::interpolation::Interpolator;
use mireg_core::tensor;
use mireg_core::transform::Transform;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::trait_::{map_samples, Metric};
use crate::error::Result;
use crate::sampling::SampleSet;
use crate::validation::validate_histogram_bins;

const PADDING: usize = 2;
const EPSILON: f32 = 1e-10;

/// Intensity range mapped onto the non-padding bins.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BinMapping {
    min: f32,
    bin_size: f32,
}

impl BinMapping {
    fn new((min, max): (f32, f32), num_bins: usize) -> Self {
        let usable = (num_bins - 2 * PADDING) as f32;
        let range = max - min;
        let bin_size = if range.is_finite() && range > 0.0 { range / usable } else { 1.0 };
        Self { min, bin_size }
    }

    /// Continuous bin coordinate, padding included.
    fn term(&self, value: f32) -> f32 {
        (value - self.min) / self.bin_size + PADDING as f32
    }
}

/// Mattes mutual information metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MattesMutualInformation {
    number_of_histogram_bins: usize,
    #[serde(skip)]
    fixed_bins: Option<BinMapping>,
    #[serde(skip)]
    moving_bins: Option<BinMapping>,
}

impl Default for MattesMutualInformation {
    fn default() -> Self {
        Self::new(50)
    }
}

impl MattesMutualInformation {
    pub fn new(number_of_histogram_bins: usize) -> Self {
        Self {
            number_of_histogram_bins,
            fixed_bins: None,
            moving_bins: None,
        }
    }

    pub fn number_of_histogram_bins(&self) -> usize {
        self.number_of_histogram_bins
    }

    /// One-hot rows `[N, bins]` of the fixed sample bins.
    fn fixed_one_hot(&self, mapping: &BinMapping, values: &[f32]) -> Vec<f32> {
        let bins = self.number_of_histogram_bins;
        let (lo, hi) = (PADDING, bins - PADDING - 1);
        let mut one_hot = vec![0.0f32; values.len() * bins];
        for (row, &v) in values.iter().enumerate() {
            let term = mapping.term(v);
            let bin = if term.is_finite() { (term.floor().max(0.0) as usize).clamp(lo, hi) } else { lo };
            one_hot[row * bins + bin] = 1.0;
        }
        one_hot
    }
}

/// Cubic B-spline `B3(x)` evaluated elementwise on `|x|`.
fn cubic_bspline<B: Backend>(abs: Tensor<B, 2>) -> Tensor<B, 2> {
    let outer = abs.clone().neg().add_scalar(2.0).clamp_min(0.0);
    let inner = abs.neg().add_scalar(1.0).clamp_min(0.0);
    let outer3 = outer.clone() * outer.clone() * outer;
    let inner3 = inner.clone() * inner.clone() * inner;
    (outer3 - inner3.mul_scalar(4.0)).div_scalar(6.0)
}

impl<B: Backend, const D: usize> Metric<B, D> for MattesMutualInformation {
    fn validate(&self) -> Result<()> {
        validate_histogram_bins(self.number_of_histogram_bins)
    }

    fn initialize(&mut self, fixed: &Image<B, D>, moving: &Image<B, D>) -> Result<()> {
        <Self as Metric<B, D>>::validate(self)?;
        let bins = self.number_of_histogram_bins;
        self.fixed_bins = Some(BinMapping::new(fixed.intensity_range(), bins));
        self.moving_bins = Some(BinMapping::new(moving.intensity_range(), bins));
        trace!(fixed = ?self.fixed_bins, moving = ?self.moving_bins, "histogram ranges");
        Ok(())
    }

    fn evaluate<T, I>(
        &self,
        samples: &SampleSet<B>,
        moving: &Image<B, D>,
        transform: &T,
        interpolator: &I,
    ) -> Result<Tensor<B, 1>>
    where
        T: Transform<B, D>,
        I: Interpolator<B>,
    {
        validate_histogram_bins(self.number_of_histogram_bins)?;
        let bins = self.number_of_histogram_bins;
        let fixed_bins = self.fixed_bins.unwrap_or_else(|| BinMapping::new(range_of(&samples.fixed_values), bins));
        let moving_bins = match self.moving_bins {
            Some(mapping) => mapping,
            None => BinMapping::new(moving.intensity_range(), bins),
        };

        let mapped = map_samples(samples, moving, transform, interpolator)?;
        let n = mapped.len();
        let device = mapped.moving_values.device();

        let one_hot = tensor::from_vec::<B, 2>(self.fixed_one_hot(&fixed_bins, &mapped.fixed_values), [n, bins], &device);

        let term = mapped
            .moving_values
            .sub_scalar(moving_bins.min)
            .div_scalar(moving_bins.bin_size)
            .add_scalar(PADDING as f32)
            .clamp(PADDING as f32, (bins - PADDING - 1) as f32)
            .reshape([n, 1]);
        let centers = tensor::from_vec::<B, 2>((0..bins).map(|b| b as f32).collect(), [1, bins], &device);
        let weights = cubic_bspline((term - centers).abs());

        // [bins_fixed, bins_moving]
        let joint = one_hot.transpose().matmul(weights);
        let total = joint.clone().sum().reshape([1, 1]);
        let p = joint / total;
        let p_fixed = p.clone().sum_dim(1);
        let p_moving = p.clone().sum_dim(0);

        let log_ratio = p.clone().add_scalar(EPSILON).log()
            - p_fixed.add_scalar(EPSILON).log()
            - p_moving.add_scalar(EPSILON).log();
        let mutual_information = (p * log_ratio).sum();

        Ok(mutual_information.neg())
    }

    fn name(&self) -> &'static str {
        "MattesMutualInformation"
    }
}

fn range_of(values: &[f32]) -> (f32, f32) {
    values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
