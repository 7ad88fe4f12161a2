//! Resampling an image onto another grid through a transform.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;

use crate::image::{generate_grid, Image};
use crate::interpolation::Interpolator;
use crate::spatial::{Direction, Point, Spacing};
use crate::tensor;
use crate::transform::Transform;

/// Resamples an input image onto an output grid.
///
/// Every output voxel is mapped to physical space, through `transform`
/// (output space → input space, i.e. the fixed → moving registration
/// transform) and sampled from the input with `interpolator`. Voxels that
/// land outside the input receive the default pixel value.
pub struct ResampleImageFilter<B, T, I, const D: usize>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    shape: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    transform: T,
    interpolator: I,
    default_pixel_value: f32,
    _phantom: PhantomData<B>,
}

impl<B, T, I, const D: usize> ResampleImageFilter<B, T, I, D>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    /// `shape` is the output tensor shape (`[z, y, x]` for 3D).
    pub fn new(
        shape: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
        transform: T,
        interpolator: I,
    ) -> Self {
        Self {
            shape,
            origin,
            spacing,
            direction,
            transform,
            interpolator,
            default_pixel_value: 0.0,
            _phantom: PhantomData,
        }
    }

    /// Output grid taken from `reference`.
    pub fn new_from_reference(reference: &Image<B, D>, transform: T, interpolator: I) -> Self {
        Self::new(
            reference.shape(),
            *reference.origin(),
            *reference.spacing(),
            *reference.direction(),
            transform,
            interpolator,
        )
    }

    pub fn with_default_pixel_value(mut self, value: f32) -> Self {
        self.default_pixel_value = value;
        self
    }

    pub fn apply(&self, input: &Image<B, D>) -> Image<B, D> {
        let device = input.device();
        let grid = Image::new(
            burn::tensor::Tensor::<B, D>::zeros(self.shape, &device),
            self.origin,
            self.spacing,
            self.direction,
        );

        let points = grid.index_to_world_tensor(generate_grid::<B, D>(self.shape, &device));
        let input_indices = input.world_to_index_tensor(self.transform.transform_points(points));
        let inside = inside_mask(&tensor::to_vec(input_indices.clone()), input.size());

        let mut values = tensor::to_vec(self.interpolator.interpolate(input.data(), input_indices));
        for (v, ok) in values.iter_mut().zip(inside) {
            if !ok {
                *v = self.default_pixel_value;
            }
        }
        grid.with_data(tensor::from_vec(values, self.shape, &device))
    }
}

/// Whether each `[N, D]` continuous index lies within the lattice, allowing
/// half a voxel beyond the outermost samples.
pub fn inside_mask<const D: usize>(indices: &[f32], size: [usize; D]) -> Vec<bool> {
    indices
        .chunks_exact(D)
        .map(|idx| {
            idx.iter()
                .zip(size.iter())
                .all(|(&i, &s)| i >= -0.5 && i <= s as f32 - 0.5)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::LinearInterpolator;
    use crate::tensor::{from_vec, to_vec};
    use crate::transform::TranslationTransform;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_identity_resample_reproduces_input() {
        let device = Default::default();
        let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let image = Image::new(
            from_vec::<Backend, 2>(values.clone(), [4, 5], &device),
            Point::new([1.0, 2.0]),
            Spacing::new([0.5, 1.5]),
            Direction::identity(),
        );
        let filter = ResampleImageFilter::new_from_reference(
            &image,
            TranslationTransform::<Backend, 2>::identity(&device),
            LinearInterpolator,
        );
        let out = to_vec(filter.apply(&image).data().clone());
        for (a, b) in out.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_shift_fills_outside_with_default() {
        let device = Default::default();
        let image = Image::new(
            Tensor::<Backend, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device),
            Point::origin(),
            Spacing::uniform(1.0),
            Direction::identity(),
        );
        let filter = ResampleImageFilter::new_from_reference(
            &image,
            TranslationTransform::<Backend, 1>::new(Tensor::from_floats([2.0], &device)),
            LinearInterpolator,
        )
        .with_default_pixel_value(-1.0);
        assert_eq!(to_vec(filter.apply(&image).data().clone()), vec![3.0, 4.0, -1.0, -1.0]);
    }

    #[test]
    fn test_inside_mask_tolerates_half_voxel() {
        let mask = inside_mask::<2>(&[-0.5, 0.0, 3.5, 1.0, 3.6, 1.0, 0.0, -0.6], [4, 2]);
        assert_eq!(mask, vec![true, true, false, false]);
    }
}
