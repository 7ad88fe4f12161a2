//! Image type with physical metadata and coordinate transformations.
//!
//! An [`Image`] couples a sample tensor with the geometry that places it in
//! physical space (origin, spacing, direction). Index to physical mapping is
//! `point = origin + direction * (index ⊙ spacing)`.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use super::grid::unravel_index;
use crate::spatial::{Direction, Point, Spacing, Vector};
use crate::tensor;

/// Volumetric image with physical metadata.
///
/// # Layout
/// The tensor is stored slowest axis first (`[z, y, x]` for 3D) while every
/// geometric quantity (continuous indices, spacing, origin) is written in
/// `(x, y, z)` order. Axis `a` of the geometry is tensor dimension `D - 1 - a`.
///
/// # Examples
/// ```rust
/// use mireg_core::Image;
/// use mireg_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 12, 14], &device);
/// let image = Image::new(
///     data,
///     Point3::new([0.0, 0.0, 0.0]),
///     Spacing3::new([0.5, 0.5, 2.0]),
///     Direction3::identity(),
/// );
/// assert_eq!(image.size(), [14, 12, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Same geometry, different samples. The tensor shape must match.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self {
            data,
            origin: self.origin,
            spacing: self.spacing,
            direction: self.direction,
        }
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Tensor shape, slowest axis first.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Number of samples along each geometric axis, in `(x, y, z)` order.
    pub fn size(&self) -> [usize; D] {
        let shape = self.shape();
        let mut size = [0usize; D];
        for (axis, s) in size.iter_mut().enumerate() {
            *s = shape[D - 1 - axis];
        }
        size
    }

    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Number of axes with more than one sample.
    pub fn effective_dimension(&self) -> usize {
        self.shape().iter().filter(|&&s| s > 1).count()
    }

    /// Samples copied to the host in row-major order.
    pub fn to_vec(&self) -> Vec<f32> {
        tensor::to_vec(self.data.clone())
    }

    /// Minimum and maximum sample value.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.to_vec()
            .into_iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Maps a physical point to a continuous index.
    ///
    /// # Panics
    /// When the direction matrix is singular; geometry is validated before
    /// registration so this only fires on hand-built images.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        let inv_dir = self
            .direction
            .try_inverse()
            .expect("direction matrix must be invertible");
        let rotated = inv_dir * (*point - self.origin);
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        index
    }

    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let mut scaled = Vector::<D>::zeros();
        for i in 0..D {
            scaled[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled
    }

    /// Physical position of every corner of the voxel lattice (2^D points).
    pub fn physical_corners(&self) -> Vec<Point<D>> {
        let size = self.size();
        (0..(1usize << D))
            .map(|mask| {
                let mut index = Point::<D>::origin();
                for axis in 0..D {
                    if mask & (1 << axis) != 0 {
                        index[axis] = (size[axis] - 1) as f64;
                    }
                }
                self.transform_continuous_index_to_physical_point(&index)
            })
            .collect()
    }

    /// Physical position of the lattice center.
    pub fn physical_center(&self) -> Point<D> {
        let size = self.size();
        let mut index = Point::<D>::origin();
        for axis in 0..D {
            index[axis] = (size[axis] as f64 - 1.0) / 2.0;
        }
        self.transform_continuous_index_to_physical_point(&index)
    }

    /// Intensity-weighted centroid in physical space.
    ///
    /// Falls back to the geometric center when the image has no positive mass.
    pub fn center_of_mass(&self) -> Point<D> {
        let shape = self.shape();
        let values = self.to_vec();
        let mut acc = [0.0f64; D];
        let mut mass = 0.0f64;
        for (flat, &v) in values.iter().enumerate() {
            let w = f64::from(v);
            if w <= 0.0 {
                continue;
            }
            let index = unravel_index(flat, shape);
            for axis in 0..D {
                acc[axis] += w * index[axis] as f64;
            }
            mass += w;
        }
        if mass <= 0.0 {
            return self.physical_center();
        }
        let mut index = Point::<D>::origin();
        for axis in 0..D {
            index[axis] = acc[axis] / mass;
        }
        self.transform_continuous_index_to_physical_point(&index)
    }

    /// Batch physical → continuous index mapping of a `[N, D]` tensor.
    ///
    /// The affine map is assembled on the host and applied as one matmul:
    /// `I = (P - O) @ T` with `T[r, c] = inv(Dir)[c, r] / S[c]`.
    ///
    /// # Panics
    /// When the direction matrix is singular, like
    /// [`transform_physical_point_to_continuous_index`](Self::transform_physical_point_to_continuous_index).
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let inv_dir = self
            .direction
            .try_inverse()
            .expect("direction matrix must be invertible");

        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((inv_dir[(c, r)] / self.spacing[c]) as f32);
            }
        }
        let t_tensor = Tensor::<B, 2>::from_data(TensorData::new(t_data, [D, D]), &device);

        (points - self.origin_tensor(&device)).matmul(t_tensor)
    }

    /// Batch continuous index → physical mapping: `P = O + I @ M` with
    /// `M[r, c] = S[r] * Dir[c, r]`.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((self.spacing[r] * self.direction[(c, r)]) as f32);
            }
        }
        let m_tensor = Tensor::<B, 2>::from_data(TensorData::new(m_data, [D, D]), &device);

        indices.matmul(m_tensor) + self.origin_tensor(&device)
    }

    fn origin_tensor(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        Tensor::from_data(TensorData::new(origin, [1, D]), device)
    }
}
