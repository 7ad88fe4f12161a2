//! Metric trait for image similarity measurement.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use mireg_core::filter::resample::inside_mask;
use mireg_core::image::Image;
use mireg_core::interpolation::Interpolator;
use mireg_core::tensor;
use mireg_core::transform::Transform;

use crate::error::{RegistrationError, Result};
use crate::sampling::SampleSet;

/// Similarity measure between a fixed and a moving image.
///
/// Values are losses: lower means better alignment. A metric is evaluated on
/// a [`SampleSet`] drawn from the fixed image; each sample is mapped through
/// the transform into the moving image and interpolated there.
///
/// # Type Parameters
/// * `B` - The tensor backend
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Metric<B: Backend, const D: usize> {
    /// Checks the metric's own settings before any image is touched.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Prepares per-level state (intensity ranges and the like) for a pair
    /// of level images.
    fn initialize(&mut self, fixed: &Image<B, D>, moving: &Image<B, D>) -> Result<()>;

    /// Loss for `samples` under `transform`, as a single-element tensor.
    ///
    /// The result is differentiable with respect to any autodiff state the
    /// transform's parameters carry.
    fn evaluate<T, I>(
        &self,
        samples: &SampleSet<B>,
        moving: &Image<B, D>,
        transform: &T,
        interpolator: &I,
    ) -> Result<Tensor<B, 1>>
    where
        T: Transform<B, D>,
        I: Interpolator<B>;

    fn name(&self) -> &'static str;
}

/// Fixed samples paired with their moving-image intensities.
pub struct MappedSamples<B: Backend> {
    /// Fixed intensities of the samples that landed inside the moving image.
    pub fixed_values: Vec<f32>,
    /// Interpolated moving intensities, same order as `fixed_values`.
    pub moving_values: Tensor<B, 1>,
}

impl<B: Backend> MappedSamples<B> {
    pub fn len(&self) -> usize {
        self.fixed_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_values.is_empty()
    }
}

/// Maps samples into the moving image and drops those that fall outside it.
///
/// Returns [`RegistrationError::NoOverlap`] (with level 0; callers attach the
/// real level) when no sample survives.
pub fn map_samples<B, T, I, const D: usize>(
    samples: &SampleSet<B>,
    moving: &Image<B, D>,
    transform: &T,
    interpolator: &I,
) -> Result<MappedSamples<B>>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    let moving_points = transform.transform_points(samples.points.clone());
    let indices = moving.world_to_index_tensor(moving_points);
    let inside = inside_mask(&tensor::to_vec(indices.clone()), moving.size());

    let keep: Vec<usize> = inside
        .iter()
        .enumerate()
        .filter_map(|(i, &ok)| ok.then_some(i))
        .collect();
    if keep.is_empty() {
        return Err(RegistrationError::NoOverlap {
            level: 0,
            samples: samples.len(),
        });
    }

    let (indices, fixed_values) = if keep.len() == samples.len() {
        (indices, samples.fixed_values.clone())
    } else {
        let fixed_values = keep.iter().map(|&i| samples.fixed_values[i]).collect();
        let rows = tensor::index_tensor::<B>(keep.iter().map(|&i| i as i64).collect(), &indices.device());
        (indices.select(0, rows), fixed_values)
    };

    Ok(MappedSamples {
        fixed_values,
        moving_values: interpolator.interpolate(moving.data(), indices),
    })
}
