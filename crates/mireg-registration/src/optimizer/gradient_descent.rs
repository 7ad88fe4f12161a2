//! Scaled gradient descent with convergence monitoring.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::learning_rate::{estimate_learning_rate, EstimateLearningRate};
use super::trait_::{IterationState, ObjectiveFunction, OptimizationReport, Optimizer, StopCondition};
use crate::error::{RegistrationError, Result};
use crate::validation::{validate_iterations, validate_learning_rate, ConvergenceMonitor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientDescentConfig {
    pub learning_rate: f64,
    pub number_of_iterations: usize,
    pub estimate_learning_rate: EstimateLearningRate,
    /// Stop once the convergence value drops below this.
    pub convergence_minimum_value: f64,
    pub convergence_window_size: usize,
    /// Physical length of one estimated step. `None` uses the smallest
    /// spacing of the current level.
    pub maximum_step_size_in_physical_units: Option<f64>,
    /// Also shorten every step to the maximum step size. When off, the
    /// maximum step size only feeds the learning-rate estimate.
    pub limit_step_to_maximum: bool,
}

impl Default for GradientDescentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            number_of_iterations: 100,
            estimate_learning_rate: EstimateLearningRate::Once,
            convergence_minimum_value: 1e-6,
            convergence_window_size: 10,
            maximum_step_size_in_physical_units: None,
            limit_step_to_maximum: true,
        }
    }
}

/// `p ← p - lr * g / s`, with `s` the parameter scales.
///
/// The learning rate is re-estimated according to
/// [`EstimateLearningRate`]. With `limit_step_to_maximum`, every step is
/// shortened so that no corner of the domain moves further than the maximum
/// step size.
#[derive(Debug, Clone)]
pub struct GradientDescentOptimizer {
    config: GradientDescentConfig,
    learning_rate: f64,
}

impl Default for GradientDescentOptimizer {
    fn default() -> Self {
        Self::new(GradientDescentConfig::default())
    }
}

impl GradientDescentOptimizer {
    pub fn new(config: GradientDescentConfig) -> Self {
        let learning_rate = config.learning_rate;
        Self { config, learning_rate }
    }

    pub fn config(&self) -> &GradientDescentConfig {
        &self.config
    }

    /// Learning rate used by the most recent step.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn describe(&self, stop: &StopCondition) -> String {
        format!("{}: {stop}", self.name())
    }
}

impl Optimizer for GradientDescentOptimizer {
    fn validate(&self) -> Result<()> {
        validate_learning_rate(self.config.learning_rate)?;
        validate_iterations(self.config.number_of_iterations)?;
        if self.config.convergence_window_size < 2 {
            return Err(RegistrationError::invalid_configuration(format!(
                "convergence window size must be at least 2, got {}",
                self.config.convergence_window_size
            )));
        }
        if !(self.config.convergence_minimum_value.is_finite() && self.config.convergence_minimum_value >= 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "convergence minimum value must be finite and non-negative, got {}",
                self.config.convergence_minimum_value
            )));
        }
        if let Some(step) = self.config.maximum_step_size_in_physical_units {
            if !(step.is_finite() && step > 0.0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "maximum step size must be positive, got {step}"
                )));
            }
        }
        Ok(())
    }

    fn optimize(
        &mut self,
        objective: &mut dyn ObjectiveFunction,
        initial: &[f64],
        scales: &[f64],
        observer: &mut dyn FnMut(&IterationState),
    ) -> Result<OptimizationReport> {
        let n = objective.number_of_parameters();
        if initial.len() != n || scales.len() != n {
            return Err(RegistrationError::ShapeMismatch {
                expected: vec![n],
                actual: vec![initial.len(), scales.len()],
            });
        }
        if scales.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(RegistrationError::optimizer(format!("parameter scales must be positive, got {scales:?}")));
        }

        let total = self.config.number_of_iterations;
        let maximum_step = self
            .config
            .maximum_step_size_in_physical_units
            .unwrap_or_else(|| objective.maximum_step_size());
        let mut monitor = ConvergenceMonitor::new(self.config.convergence_window_size);
        let mut parameters = initial.to_vec();
        let mut value = f64::NAN;
        self.learning_rate = self.config.learning_rate;

        for iteration in 0..total {
            let (current, gradient) = objective.value_and_derivative(&parameters)?;
            if !current.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
                return Err(RegistrationError::numerical_instability(format!(
                    "non-finite metric value or gradient at iteration {iteration}"
                )));
            }
            value = current;

            monitor.add_value(value);
            let convergence_value = monitor.convergence_value();
            observer(&IterationState {
                iteration,
                total_iterations: total,
                value,
                learning_rate: self.learning_rate,
                convergence_value,
            });
            if convergence_value <= self.config.convergence_minimum_value {
                let stop = StopCondition::Converged { iteration };
                debug!(iteration, value, "converged");
                return Ok(OptimizationReport {
                    parameters,
                    value,
                    iterations: iteration + 1,
                    learning_rate: self.learning_rate,
                    description: self.describe(&stop),
                    stop_condition: stop,
                });
            }

            let direction: Vec<f64> = gradient.iter().zip(scales).map(|(g, s)| -g / s).collect();
            let estimate = match self.config.estimate_learning_rate {
                EstimateLearningRate::Never => false,
                EstimateLearningRate::Once => iteration == 0,
                EstimateLearningRate::EachIteration => true,
            };
            if estimate {
                self.learning_rate = estimate_learning_rate(&*objective, &parameters, &direction, maximum_step)?;
                debug!(iteration, learning_rate = self.learning_rate, "estimated learning rate");
            }

            let mut step: Vec<f64> = direction.iter().map(|d| self.learning_rate * d).collect();
            if self.config.limit_step_to_maximum {
                let shift = objective.maximum_physical_shift(&parameters, &step)?;
                if shift > maximum_step {
                    let shrink = maximum_step / shift;
                    step.iter_mut().for_each(|s| *s *= shrink);
                    trace!(iteration, shift, "step capped");
                }
            }
            parameters.iter_mut().zip(&step).for_each(|(p, s)| *p += s);
        }

        let stop = StopCondition::MaximumIterations(total);
        Ok(OptimizationReport {
            parameters,
            value,
            iterations: total,
            learning_rate: self.learning_rate,
            description: self.describe(&stop),
            stop_condition: stop,
        })
    }

    fn name(&self) -> &'static str {
        "GradientDescentOptimizer"
    }
}
