//! Precondition checks for registration inputs and configuration, and the
//! windowed convergence monitor used by the gradient descent optimizer.

use std::collections::VecDeque;

use burn::tensor::backend::Backend;
use mireg_core::image::Image;

use crate::error::{ImageRole, RegistrationError, Result};

/// Rejects images whose geometry cannot be mapped to physical space.
pub fn validate_geometry<B: Backend, const D: usize>(image: &Image<B, D>, role: ImageRole) -> Result<()> {
    let size = image.size();
    if let Some(axis) = size.iter().position(|&s| s == 0) {
        return Err(RegistrationError::geometry(
            role,
            format!("axis {axis} has zero samples (size {size:?})"),
        ));
    }
    if !image.spacing().is_valid_spacing() {
        return Err(RegistrationError::geometry(
            role,
            format!("spacing must be finite and positive, got {:?}", image.spacing().to_vec()),
        ));
    }
    if !image.origin().to_vec().iter().all(|v| v.is_finite()) {
        return Err(RegistrationError::geometry(role, "origin is not finite"));
    }
    if !image.direction().is_invertible() {
        return Err(RegistrationError::geometry(role, "direction matrix is singular"));
    }
    Ok(())
}

/// Both images must span the same number of non-degenerate axes, so a
/// single-slice series cannot be registered against a volume.
pub fn validate_dimensionality<B: Backend, const D: usize>(
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
) -> Result<()> {
    let (f, m) = (fixed.effective_dimension(), moving.effective_dimension());
    if f != m {
        return Err(RegistrationError::dimension_mismatch(format!(
            "fixed image spans {f} axes, moving image spans {m} (sizes {:?} and {:?})",
            fixed.size(),
            moving.size()
        )));
    }
    Ok(())
}

pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if !lr.is_finite() || lr <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "learning rate must be positive, got {lr}"
        )));
    }
    Ok(())
}

pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration("iterations must be positive"));
    }
    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "iterations too large: {iterations}"
        )));
    }
    Ok(())
}

/// Mattes histograms pad two bins on each side of the intensity range.
pub fn validate_histogram_bins(num_bins: usize) -> Result<()> {
    if num_bins < 5 {
        return Err(RegistrationError::invalid_configuration(format!(
            "number of histogram bins must be at least 5, got {num_bins}"
        )));
    }
    if num_bins > 1024 {
        return Err(RegistrationError::invalid_configuration(format!(
            "number of histogram bins too large: {num_bins}"
        )));
    }
    Ok(())
}

pub fn validate_sampling_percentage(percentage: f64) -> Result<()> {
    if !(percentage > 0.0 && percentage <= 1.0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "sampling percentage must be in (0, 1], got {percentage}"
        )));
    }
    Ok(())
}

/// Tracks the trend of the last `window_size` metric values.
///
/// Values are normalized by the accumulated absolute energy of every value
/// seen so far and a least-squares line is fitted over the window,
/// parameterized on `[0, 1]`. The convergence value is the negated slope:
/// it shrinks towards zero as the metric flattens and turns negative when the
/// metric starts to rise.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    window_size: usize,
    values: VecDeque<f64>,
    total_energy: f64,
}

impl ConvergenceMonitor {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(2),
            values: VecDeque::with_capacity(window_size.max(2)),
            total_energy: 0.0,
        }
    }

    pub fn add_value(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.window_size {
            self.values.pop_front();
        }
        self.total_energy += value.abs();
    }

    /// `f64::MAX` until the window is full.
    pub fn convergence_value(&self) -> f64 {
        if self.values.len() < self.window_size || self.total_energy <= 0.0 {
            return f64::MAX;
        }
        let n = self.window_size as f64;
        let ts = (0..self.window_size).map(|i| i as f64 / (n - 1.0));
        let ys = self.values.iter().map(|v| v / self.total_energy);

        let (mut st, mut sy, mut stt, mut sty) = (0.0, 0.0, 0.0, 0.0);
        for (t, y) in ts.zip(ys) {
            st += t;
            sy += y;
            stt += t * t;
            sty += t * y;
        }
        let slope = (n * sty - st * sy) / (n * stt - st * st);
        -slope
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.total_energy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use mireg_core::spatial::{Direction, Point, Spacing};

    type B = NdArray<f32>;

    fn image(shape: [usize; 3], spacing: [f64; 3], direction: Direction<3>) -> Image<B, 3> {
        let device = Default::default();
        Image::new(Tensor::zeros(shape, &device), Point::origin(), Spacing::new(spacing), direction)
    }

    #[test]
    fn test_geometry_checks() {
        assert!(validate_geometry(&image([2, 3, 4], [1.0, 1.0, 1.0], Direction::identity()), ImageRole::Fixed).is_ok());

        let err = validate_geometry(&image([2, 3, 4], [1.0, 0.0, 1.0], Direction::identity()), ImageRole::Moving)
            .unwrap_err();
        assert!(err.is_geometry());
        assert!(err.to_string().contains("moving"));

        assert!(validate_geometry(&image([2, 0, 4], [1.0; 3], Direction::identity()), ImageRole::Fixed).is_err());

        let singular = Direction::from_row_slice(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(validate_geometry(&image([2, 3, 4], [1.0; 3], singular), ImageRole::Fixed).is_err());
    }

    #[test]
    fn test_dimensionality_check() {
        let volume = image([4, 4, 4], [1.0; 3], Direction::identity());
        let slice = image([1, 4, 4], [1.0; 3], Direction::identity());
        assert!(validate_dimensionality(&volume, &volume).is_ok());
        assert!(matches!(
            validate_dimensionality(&volume, &slice),
            Err(RegistrationError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_scalar_validators() {
        assert!(validate_learning_rate(1.0).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(f64::NAN).is_err());
        assert!(validate_iterations(100).is_ok());
        assert!(validate_iterations(0).is_err());
        assert!(validate_histogram_bins(50).is_ok());
        assert!(validate_histogram_bins(4).is_err());
        assert!(validate_sampling_percentage(0.01).is_ok());
        assert!(validate_sampling_percentage(1.0).is_ok());
        assert!(validate_sampling_percentage(0.0).is_err());
        assert!(validate_sampling_percentage(1.5).is_err());
    }

    #[test]
    fn test_convergence_monitor() {
        let mut monitor = ConvergenceMonitor::new(10);
        for i in 0..9 {
            monitor.add_value(-1.0 - 0.1 * i as f64);
        }
        assert_eq!(monitor.convergence_value(), f64::MAX);

        // Still improving: clearly positive.
        monitor.add_value(-1.9);
        assert!(monitor.convergence_value() > 1e-3);

        // Flat tail: converges.
        for _ in 0..10 {
            monitor.add_value(-2.0);
        }
        assert!(monitor.convergence_value().abs() < 1e-12);

        monitor.reset();
        assert_eq!(monitor.convergence_value(), f64::MAX);
    }
}
