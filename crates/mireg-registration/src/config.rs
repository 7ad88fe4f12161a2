//! Serializable registration configuration.

use mireg_core::interpolation::InterpolatorKind;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metric::{MetricConfig, MetricKind};
use crate::multires::MultiResolutionSchedule;
use crate::optimizer::{GradientDescentConfig, GradientDescentOptimizer, Optimizer, ScalesEstimation};
use crate::registration::ImageRegistrationMethod;
use crate::sampling::SamplingConfig;
use crate::validation::validate_histogram_bins;

/// Every knob of a registration run.
///
/// The default is the CT/MR setup: Mattes mutual information with 50 bins on
/// a random 1% of the fixed voxels, linear interpolation, gradient descent
/// (learning rate 1, 100 iterations, learning rate estimated once per level,
/// convergence window 10 with threshold 1e-6) with physical-shift scales over
/// a three level pyramid (shrink 4/2/1, sigmas 2/1/0 mm).
///
/// Every field is optional in a file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub interpolator: InterpolatorKind,
    pub scales: ScalesEstimation,
    /// Iterations between progress log lines.
    pub log_interval: usize,
    pub metric: MetricConfig,
    pub sampling: SamplingConfig,
    pub optimizer: GradientDescentConfig,
    pub schedule: MultiResolutionSchedule,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            interpolator: InterpolatorKind::Linear,
            scales: ScalesEstimation::PhysicalShift,
            log_interval: 10,
            metric: MetricConfig::default(),
            sampling: SamplingConfig::default(),
            optimizer: GradientDescentConfig::default(),
            schedule: MultiResolutionSchedule::default(),
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampling.seed = Some(seed);
        self
    }

    /// Checks every section without touching any image.
    pub fn validate(&self) -> Result<()> {
        if let MetricConfig::MattesMutualInformation {
            number_of_histogram_bins,
        } = self.metric
        {
            validate_histogram_bins(number_of_histogram_bins)?;
        }
        self.sampling.validate()?;
        self.schedule.validate()?;
        GradientDescentOptimizer::new(self.optimizer.clone()).validate()
    }

    /// Registration method configured from this file.
    pub fn build(&self) -> Result<ImageRegistrationMethod<MetricKind, GradientDescentOptimizer>> {
        self.validate()?;
        Ok(
            ImageRegistrationMethod::new(self.metric.build(), GradientDescentOptimizer::new(self.optimizer.clone()))
                .with_interpolator(self.interpolator)
                .with_sampling(self.sampling.clone())
                .with_schedule(self.schedule.clone())
                .with_scales(self.scales),
        )
    }
}
