//! Error types for registration.

use std::fmt;

use thiserror::Error;

/// Which input of a registration an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Fixed,
    Moving,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Moving => f.write_str("moving"),
        }
    }
}

/// Main error type for registration operations.
///
/// Running out of iterations is not an error; it is reported through the
/// optimizer's stop condition.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Metric error: {0}")]
    MetricError(String),

    #[error("Optimizer error: {0}")]
    OptimizerError(String),

    #[error("Transform error: {0}")]
    TransformError(String),

    /// Degenerate image geometry (empty axis, bad spacing, singular direction).
    #[error("Geometry error in {image} image: {reason}")]
    GeometryError { image: ImageRole, reason: String },

    /// No sample of the fixed image maps inside the moving image.
    #[error("Geometry error: images do not overlap at level {level} ({samples} samples, none inside the moving image)")]
    NoOverlap { level: usize, samples: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::MetricError(msg.into())
    }

    pub fn optimizer(msg: impl Into<String>) -> Self {
        Self::OptimizerError(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::TransformError(msg.into())
    }

    pub fn geometry(image: ImageRole, reason: impl Into<String>) -> Self {
        Self::GeometryError {
            image,
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    /// Attaches the pyramid level to an overlap error raised by a metric.
    pub fn at_level(self, level: usize) -> Self {
        match self {
            Self::NoOverlap { samples, .. } => Self::NoOverlap { level, samples },
            other => other,
        }
    }

    /// Errors caused by the spatial layout of the inputs.
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            Self::GeometryError { .. } | Self::NoOverlap { .. } | Self::DimensionMismatch(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
