//! Optimizers over transform parameters.

pub mod gradient_descent;
pub mod learning_rate;
pub mod scales;
pub mod trait_;

pub use gradient_descent::{GradientDescentConfig, GradientDescentOptimizer};
pub use learning_rate::{estimate_learning_rate, EstimateLearningRate};
pub use scales::{estimate_physical_shift_scales, ScalesEstimation, SMALL_PARAMETER_VARIATION};
pub use trait_::{IterationState, ObjectiveFunction, OptimizationReport, Optimizer, StopCondition};
