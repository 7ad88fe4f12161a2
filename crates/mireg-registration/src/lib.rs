//! Intensity-based multi-resolution registration of 3D medical images.
//!
//! The pieces follow the classic registration framework: a [`metric`]
//! compares sampled fixed intensities with interpolated moving intensities,
//! an [`optimizer`] updates the transform parameters, and the
//! [`registration`] driver runs the optimizer over a smoothing and
//! shrinking pyramid. [`pipeline::multires_registration`] wires all of it
//! with the CT/MR defaults.

pub mod config;
pub mod error;
pub mod metric;
pub mod multires;
pub mod optimizer;
pub mod pipeline;
pub mod progress;
pub mod registration;
pub mod sampling;
pub mod validation;

pub use config::RegistrationConfig;
pub use error::{ImageRole, RegistrationError, Result};
pub use metric::{MattesMutualInformation, MeanSquares, Metric, MetricConfig, MetricKind};
pub use multires::MultiResolutionSchedule;
pub use optimizer::{GradientDescentConfig, GradientDescentOptimizer, Optimizer, StopCondition};
pub use pipeline::{multires_registration, multires_registration_with};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use registration::{ImageRegistrationMethod, LevelReport, RegistrationResult};
pub use sampling::{SamplingConfig, SamplingStrategy};
pub use validation::ConvergenceMonitor;
