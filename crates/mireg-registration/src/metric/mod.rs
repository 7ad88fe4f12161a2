//! Similarity metrics.

pub mod mattes_mutual_information;
pub mod mean_squares;
pub mod trait_;

pub use mattes_mutual_information::MattesMutualInformation;
pub use mean_squares::MeanSquares;
pub use trait_::{map_samples, MappedSamples, Metric};

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use mireg_core::image::Image;
use mireg_core::interpolation::Interpolator;
use mireg_core::transform::Transform;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sampling::SampleSet;

/// Metric selection as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricConfig {
    MattesMutualInformation { number_of_histogram_bins: usize },
    MeanSquares,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self::MattesMutualInformation {
            number_of_histogram_bins: 50,
        }
    }
}

impl MetricConfig {
    pub fn build(&self) -> MetricKind {
        match *self {
            Self::MattesMutualInformation {
                number_of_histogram_bins,
            } => MetricKind::MattesMutualInformation(MattesMutualInformation::new(number_of_histogram_bins)),
            Self::MeanSquares => MetricKind::MeanSquares(MeanSquares),
        }
    }
}

/// Runtime-selected metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    MattesMutualInformation(MattesMutualInformation),
    MeanSquares(MeanSquares),
}

impl Default for MetricKind {
    fn default() -> Self {
        MetricConfig::default().build()
    }
}

impl<B: Backend, const D: usize> Metric<B, D> for MetricKind {
    fn validate(&self) -> Result<()> {
        match self {
            Self::MattesMutualInformation(m) => Metric::<B, D>::validate(m),
            Self::MeanSquares(m) => Metric::<B, D>::validate(m),
        }
    }

    fn initialize(&mut self, fixed: &Image<B, D>, moving: &Image<B, D>) -> Result<()> {
        match self {
            Self::MattesMutualInformation(m) => m.initialize(fixed, moving),
            Self::MeanSquares(m) => m.initialize(fixed, moving),
        }
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
        match self {
            Self::MattesMutualInformation(m) => m.evaluate(samples, moving, transform, interpolator),
            Self::MeanSquares(m) => m.evaluate(samples, moving, transform, interpolator),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::MattesMutualInformation(m) => Metric::<B, D>::name(m),
            Self::MeanSquares(m) => Metric::<B, D>::name(m),
        }
    }
}
