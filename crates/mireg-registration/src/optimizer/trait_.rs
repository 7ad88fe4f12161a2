//! Optimizer and objective traits.
//!
//! Optimizers work on plain host parameter vectors. The objective owns
//! everything image-related (sampling, metric evaluation, autodiff), so an
//! optimizer only sees values, gradients and physical step lengths.

use std::fmt;

use crate::error::Result;

/// Function minimized by an [`Optimizer`].
pub trait ObjectiveFunction {
    fn number_of_parameters(&self) -> usize;

    /// Metric value and its gradient with respect to the parameters.
    fn value_and_derivative(&mut self, parameters: &[f64]) -> Result<(f64, Vec<f64>)>;

    /// Largest physical displacement of any sample-domain corner when the
    /// parameters move from `parameters` to `parameters + step`.
    fn maximum_physical_shift(&self, parameters: &[f64], step: &[f64]) -> Result<f64>;

    /// Natural step length in physical units for the current domain.
    fn maximum_step_size(&self) -> f64;
}

/// Why an optimization run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopCondition {
    MaximumIterations(usize),
    Converged { iteration: usize },
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaximumIterations(n) => write!(f, "Maximum number of iterations ({n}) exceeded."),
            Self::Converged { iteration } => write!(f, "Convergence checker passed at iteration {iteration}."),
        }
    }
}

/// State of one iteration, before the step is applied.
#[derive(Debug, Clone)]
pub struct IterationState {
    pub iteration: usize,
    pub total_iterations: usize,
    pub value: f64,
    pub learning_rate: f64,
    pub convergence_value: f64,
}

/// Result of [`Optimizer::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub parameters: Vec<f64>,
    /// Value at the last evaluated position.
    pub value: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    pub stop_condition: StopCondition,
    /// Stop condition prefixed with the optimizer name.
    pub description: String,
}

/// Minimizes an [`ObjectiveFunction`] starting from given parameters.
pub trait Optimizer {
    /// Checks the optimizer settings.
    fn validate(&self) -> Result<()>;

    /// Runs one optimization. `scales` divide the gradient component-wise;
    /// `observer` is called once per iteration.
    fn optimize(
        &mut self,
        objective: &mut dyn ObjectiveFunction,
        initial: &[f64],
        scales: &[f64],
        observer: &mut dyn FnMut(&IterationState),
    ) -> Result<OptimizationReport>;

    fn name(&self) -> &'static str;
}
