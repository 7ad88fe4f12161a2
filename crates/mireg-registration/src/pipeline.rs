//! One-call multi-resolution registration.

use burn::tensor::backend::AutodiffBackend;
use mireg_core::image::Image;
use mireg_core::transform::ParametricTransform;
use tracing::{debug, info};

use crate::config::RegistrationConfig;
use crate::error::Result;
use crate::progress::ConsoleProgressCallback;
use crate::registration::RegistrationResult;

/// Registers `moving` onto `fixed` with the default CT/MR configuration and
/// returns the final transform and metric value.
///
/// The stopping condition is not returned, so it is logged at info level
/// together with the final metric value.
///
/// Sampling is random and unseeded, so repeated runs give slightly different
/// results. Use [`multires_registration_with`] with a seeded configuration
/// for reproducible output.
pub fn multires_registration<B, T, const D: usize>(
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
    initial: &T,
) -> Result<(T, f64)>
where
    B: AutodiffBackend,
    T: ParametricTransform<B, D>,
{
    let result = multires_registration_with(fixed, moving, initial, &RegistrationConfig::default())?;
    info!("Final metric value: {}", result.metric_value);
    info!("Optimizer's stopping condition, {}", result.stop_condition);
    Ok((result.transform, result.metric_value))
}

/// Same as [`multires_registration`] with an explicit configuration, returning
/// the full per-level report.
///
/// The result carries the stopping condition; the final metric value and the
/// stopping condition are only logged at debug level.
pub fn multires_registration_with<B, T, const D: usize>(
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
    initial: &T,
    config: &RegistrationConfig,
) -> Result<RegistrationResult<T>>
where
    B: AutodiffBackend,
    T: ParametricTransform<B, D>,
{
    let mut method = config.build()?;
    method.add_progress_callback(Box::new(ConsoleProgressCallback::new(config.log_interval)));

    let result = method.execute(fixed, moving, initial)?;
    debug!("Final metric value: {}", result.metric_value);
    debug!("Optimizer's stopping condition, {}", result.stop_condition);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;
    use burn::backend::Autodiff;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use mireg_core::spatial::{Direction, Point, Spacing};
    use mireg_core::transform::RigidTransform;

    type B = Autodiff<NdArray<f32>>;

    #[test]
    fn test_volume_against_slice_is_rejected() {
        let device = Default::default();
        let volume = Image::<B, 3>::new(
            Tensor::ones([8, 8, 8], &device),
            Point::origin(),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let slice = Image::<B, 3>::new(
            Tensor::ones([1, 8, 8], &device),
            Point::origin(),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let initial = RigidTransform::<B, 3>::identity(None, &device);
        let err = multires_registration(&volume, &slice, &initial).unwrap_err();
        assert!(matches!(err, RegistrationError::DimensionMismatch(_)));
        assert!(err.is_geometry());
    }
}
