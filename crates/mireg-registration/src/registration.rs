//! Multi-resolution image registration driver.
//!
//! For every pyramid level, coarsest first, the metric is prepared for the
//! level images, parameter scales are estimated on the fixed level's corners
//! and the optimizer runs from the parameters the previous level ended with.
//! The caller's initial transform is only read; the result is a new instance.

use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use mireg_core::image::Image;
use mireg_core::interpolation::{Interpolator, InterpolatorKind};
use mireg_core::tensor;
use mireg_core::transform::ParametricTransform;
use tracing::{debug, info};

use crate::error::{ImageRole, RegistrationError, Result};
use crate::metric::Metric;
use crate::multires::MultiResolutionSchedule;
use crate::optimizer::{
    GradientDescentOptimizer, ObjectiveFunction, Optimizer, ScalesEstimation, StopCondition,
    SMALL_PARAMETER_VARIATION,
};
use crate::progress::{ProgressCallback, ProgressInfo, ProgressTracker};
use crate::sampling::{ImageSampler, SamplingConfig};
use crate::validation::{validate_dimensionality, validate_geometry};

/// Metric evaluation at one pyramid level, seen by the optimizer as a
/// function of the transform parameters.
struct LevelObjective<'a, B, M, T, I, const D: usize>
where
    B: AutodiffBackend,
{
    level: usize,
    fixed: &'a Image<B, D>,
    moving: &'a Image<B, D>,
    metric: &'a M,
    interpolator: &'a I,
    sampler: &'a mut ImageSampler,
    template: &'a T,
    /// Physical corners of the fixed level image, `[2^D, D]`.
    corners: Tensor<B, 2>,
    step_size: f64,
}

impl<B, M, T, I, const D: usize> LevelObjective<'_, B, M, T, I, D>
where
    B: AutodiffBackend,
    T: ParametricTransform<B, D>,
{
    fn corner_displacement(&self, parameters: &[f64], step: &[f64]) -> f64 {
        let before = self.template.with_parameter_values(parameters).transform_points(self.corners.clone());
        let moved: Vec<f64> = parameters.iter().zip(step).map(|(p, s)| p + s).collect();
        let after = self.template.with_parameter_values(&moved).transform_points(self.corners.clone());
        tensor::to_vec(after - before)
            .chunks_exact(D)
            .map(|row| row.iter().map(|&v| f64::from(v).powi(2)).sum::<f64>().sqrt())
            .fold(0.0, f64::max)
    }
}

impl<B, M, T, I, const D: usize> ObjectiveFunction for LevelObjective<'_, B, M, T, I, D>
where
    B: AutodiffBackend,
    M: Metric<B, D>,
    T: ParametricTransform<B, D>,
    I: Interpolator<B>,
{
    fn number_of_parameters(&self) -> usize {
        self.template.num_parameters()
    }

    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)> {
        let samples = self.sampler.sample(self.fixed);
        let device = self.fixed.device();

        let values: Vec<f32> = parameters.iter().map(|&p| p as f32).collect();
        let params = tensor::from_vec::<B, 1>(values, [parameters.len()], &device).require_grad();
        let transform = self.template.with_parameters(params.clone());

        let loss = self
            .metric
            .evaluate(&samples, self.moving, &transform, self.interpolator)
            .map_err(|e| e.at_level(self.level))?;
        let value = tensor::to_scalar(loss.clone());

        let grads = loss.backward();
        let gradient = match params.grad(&grads) {
            Some(grad) => tensor::to_vec(grad).into_iter().map(f64::from).collect(),
            None => vec![0.0; parameters.len()],
        };
        Ok((value, gradient))
    }

    fn maximum_physical_shift(&self, parameters: &[f64], step: &[f64]) -> Result<f64> {
        let largest = step.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        if largest == 0.0 {
            return Ok(0.0);
        }
        // Corner coordinates are f32; steps below the small parameter variation are measured
        // scaled up and the displacement scaled back down.
        if largest < SMALL_PARAMETER_VARIATION {
            let k = SMALL_PARAMETER_VARIATION / largest;
            let scaled: Vec<f64> = step.iter().map(|s| s * k).collect();
            return Ok(self.corner_displacement(parameters, &scaled) / k);
        }
        Ok(self.corner_displacement(parameters, step))
    }

    fn maximum_step_size(&self) -> f64 {
        self.step_size
    }
}

fn corner_tensor<B: AutodiffBackend, const D: usize>(image: &Image<B, D>) -> Tensor<B, 2> {
    let corners = image.physical_corners();
    let n = corners.len();
    let coords = corners
        .iter()
        .flat_map(|p| p.coords().into_iter().map(|c| c as f32))
        .collect();
    tensor::from_vec(coords, [n, D], &image.device())
}

/// Outcome of one pyramid level.
#[derive(Debug, Clone)]
pub struct LevelReport {
    pub level: usize,
    pub shrink_factor: usize,
    pub smoothing_sigma: f64,
    /// Fixed level tensor shape.
    pub shape: Vec<usize>,
    pub scales: Vec<f64>,
    pub iterations: usize,
    pub metric_value: f64,
    pub learning_rate: f64,
    pub stop_condition: StopCondition,
}

/// Outcome of a full registration.
#[derive(Debug, Clone)]
pub struct RegistrationResult<T> {
    /// Fixed → moving transform.
    pub transform: T,
    /// Metric value reported by the optimizer at the finest level.
    pub metric_value: f64,
    /// Human-readable stop condition of the finest level.
    pub stop_condition: String,
    pub levels: Vec<LevelReport>,
}

/// Configurable multi-resolution registration.
///
/// # Examples
/// ```rust,ignore
/// let mut method = ImageRegistrationMethod::new(MattesMutualInformation::new(50), GradientDescentOptimizer::default())
///     .with_schedule(MultiResolutionSchedule::default());
/// let result = method.execute(&fixed, &moving, &initial)?;
/// ```
pub struct ImageRegistrationMethod<M, O = GradientDescentOptimizer> {
    metric: M,
    optimizer: O,
    interpolator: InterpolatorKind,
    sampling: SamplingConfig,
    schedule: MultiResolutionSchedule,
    scales: ScalesEstimation,
    progress: ProgressTracker,
}

impl<M, O> ImageRegistrationMethod<M, O> {
    pub fn new(metric: M, optimizer: O) -> Self {
        Self {
            metric,
            optimizer,
            interpolator: InterpolatorKind::default(),
            sampling: SamplingConfig::default(),
            schedule: MultiResolutionSchedule::default(),
            scales: ScalesEstimation::default(),
            progress: ProgressTracker::new(),
        }
    }

    pub fn with_interpolator(mut self, interpolator: InterpolatorKind) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_schedule(mut self, schedule: MultiResolutionSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_scales(mut self, scales: ScalesEstimation) -> Self {
        self.scales = scales;
        self
    }

    pub fn add_progress_callback(&mut self, callback: Box<dyn ProgressCallback>) {
        self.progress.add_callback(callback);
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub fn schedule(&self) -> &MultiResolutionSchedule {
        &self.schedule
    }

    /// Registers `moving` onto `fixed`, starting from `initial`.
    ///
    /// Configuration is checked first, then the geometry of both images;
    /// either failure returns before any optimizer iteration runs.
    pub fn execute<B, T, const D: usize>(
        &mut self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        initial: &T,
    ) -> Result<RegistrationResult<T>>
    where
        B: AutodiffBackend,
        M: Metric<B, D>,
        O: Optimizer,
        T: ParametricTransform<B, D>,
    {
        self.schedule.validate()?;
        self.sampling.validate()?;
        Metric::<B, D>::validate(&self.metric)?;
        self.optimizer.validate()?;

        validate_geometry(fixed, ImageRole::Fixed)?;
        validate_geometry(moving, ImageRole::Moving)?;
        validate_dimensionality(fixed, moving)?;

        let mut parameters = initial.parameter_values();
        if parameters.len() != initial.num_parameters() {
            return Err(RegistrationError::transform(format!(
                "{} reports {} parameters but carries {}",
                initial.name(),
                initial.num_parameters(),
                parameters.len()
            )));
        }

        let fixed_pyramid = self.schedule.pyramid(fixed);
        let moving_pyramid = self.schedule.pyramid(moving);
        let mut sampler = ImageSampler::new(&self.sampling);
        self.progress.restart();

        let levels = self.schedule.levels();
        info!(
            metric = self.metric.name(),
            optimizer = self.optimizer.name(),
            transform = initial.name(),
            levels,
            "starting registration"
        );

        let mut reports = Vec::with_capacity(levels);
        let mut last = None;
        for level in 0..levels {
            let fixed_level = fixed_pyramid.level(level);
            let moving_level = moving_pyramid.level(level);
            self.metric.initialize(fixed_level, moving_level)?;
            self.progress.level_start(level, &fixed_level.shape());

            let mut objective = LevelObjective {
                level,
                fixed: fixed_level,
                moving: moving_level,
                metric: &self.metric,
                interpolator: &self.interpolator,
                sampler: &mut sampler,
                template: initial,
                corners: corner_tensor(fixed_level),
                step_size: fixed_level.spacing().min_spacing(),
            };
            let scales = self.scales.estimate(&objective, &parameters)?;
            debug!(level, ?scales, "parameter scales");

            let progress = &self.progress;
            let report = self.optimizer.optimize(&mut objective, &parameters, &scales, &mut |state| {
                progress.report(&ProgressInfo {
                    level,
                    iteration: state.iteration,
                    total_iterations: state.total_iterations,
                    value: state.value,
                    learning_rate: state.learning_rate,
                    convergence_value: state.convergence_value,
                    elapsed: progress.elapsed(),
                })
            })?;

            debug!(level, iterations = report.iterations, value = report.value, "level finished");
            self.progress.level_complete(level, &report.description);

            parameters.clone_from(&report.parameters);
            reports.push(LevelReport {
                level,
                shrink_factor: self.schedule.shrink_factors[level],
                smoothing_sigma: self.schedule.smoothing_sigmas[level],
                shape: fixed_level.shape().to_vec(),
                scales,
                iterations: report.iterations,
                metric_value: report.value,
                learning_rate: report.learning_rate,
                stop_condition: report.stop_condition.clone(),
            });
            last = Some(report);
        }

        let last = last.ok_or_else(|| RegistrationError::invalid_configuration("schedule has no levels"))?;
        Ok(RegistrationResult {
            transform: initial.with_parameter_values(&parameters),
            metric_value: last.value,
            stop_condition: last.description,
            levels: reports,
        })
    }
}
