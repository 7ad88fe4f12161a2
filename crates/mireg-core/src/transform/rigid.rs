//! Rigid (Euler) transform: rotation about a fixed center plus translation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::{vector_tensor, CenteredTransform, ParametricTransform, Transform};
use crate::spatial::{Point, Vector};

/// Euler rigid transform, `T(x) = R(x - c) + c + t`.
///
/// Parameters are the rotation angles followed by the translation:
/// `[θ, t_x, t_y]` in 2D and `[θ_x, θ_y, θ_z, t_x, t_y, t_z]` in 3D, angles
/// in radians with `R = R_z · R_y · R_x`. The center `c` is fixed and is not
/// optimized.
#[derive(Debug, Clone)]
pub struct RigidTransform<B: Backend, const D: usize> {
    parameters: Tensor<B, 1>,
    center: Tensor<B, 1>,
}

/// Number of rotation angles for a given dimensionality.
pub const fn rotation_count(dim: usize) -> usize {
    match dim {
        2 => 1,
        3 => 3,
        _ => 0,
    }
}

impl<B: Backend, const D: usize> RigidTransform<B, D> {
    /// # Arguments
    /// * `rotation` - `[1]` (2D) or `[3]` (3D) angles in radians
    /// * `translation` - `[D]`
    /// * `center` - `[D]` fixed center of rotation
    pub fn new(rotation: Tensor<B, 1>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            parameters: Tensor::cat(vec![rotation, translation], 0),
            center,
        }
    }

    /// No rotation, no translation, rotating about `center` (origin if `None`).
    pub fn identity(center: Option<Tensor<B, 1>>, device: &B::Device) -> Self {
        let center = center.unwrap_or_else(|| Tensor::zeros([D], device));
        Self {
            parameters: Tensor::zeros([rotation_count(D) + D], device),
            center,
        }
    }

    pub fn rotation(&self) -> Tensor<B, 1> {
        self.parameters.clone().slice([0..rotation_count(D)])
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        let r = rotation_count(D);
        self.parameters.clone().slice([r..r + D])
    }

    pub fn center(&self) -> Tensor<B, 1> {
        self.center.clone()
    }

    /// Rotation matrix assembled from tensor slices so gradients flow back
    /// to the angles.
    fn rotation_matrix(&self) -> Tensor<B, 2> {
        let p = &self.parameters;
        match D {
            3 => {
                let alpha = p.clone().slice([0..1]);
                let beta = p.clone().slice([1..2]);
                let gamma = p.clone().slice([2..3]);

                let (cx, sx) = (alpha.clone().cos(), alpha.sin());
                let (cy, sy) = (beta.clone().cos(), beta.sin());
                let (cz, sz) = (gamma.clone().cos(), gamma.sin());

                let r11 = cz.clone() * cy.clone();
                let r12 = cz.clone() * sy.clone() * sx.clone() - sz.clone() * cx.clone();
                let r13 = cz.clone() * sy.clone() * cx.clone() + sz.clone() * sx.clone();

                let r21 = sz.clone() * cy.clone();
                let r22 = sz.clone() * sy.clone() * sx.clone() + cz.clone() * cx.clone();
                let r23 = sz * sy.clone() * cx.clone() - cz * sx.clone();

                let r31 = sy.neg();
                let r32 = cy.clone() * sx;
                let r33 = cy * cx;

                Tensor::cat(vec![r11, r12, r13, r21, r22, r23, r31, r32, r33], 0).reshape([3, 3])
            }
            2 => {
                let theta = p.clone().slice([0..1]);
                let (c, s) = (theta.clone().cos(), theta.sin());
                Tensor::cat(vec![c.clone(), s.clone().neg(), s, c], 0).reshape([2, 2])
            }
            _ => Tensor::eye(D, &p.device()),
        }
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for RigidTransform<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // Row-vector form: y = (x - c) @ R^T + c + t
        let r = self.rotation_matrix();
        let c = self.center.clone().reshape([1, D]);
        let t = self.translation().reshape([1, D]);
        (points - c.clone()).matmul(r.transpose()) + c + t
    }
}

impl<B: Backend, const D: usize> ParametricTransform<B, D> for RigidTransform<B, D> {
    fn parameters(&self) -> Tensor<B, 1> {
        self.parameters.clone()
    }

    fn with_parameters(&self, parameters: Tensor<B, 1>) -> Self {
        Self {
            parameters,
            center: self.center.clone(),
        }
    }

    fn num_parameters(&self) -> usize {
        rotation_count(D) + D
    }

    fn name(&self) -> &'static str {
        "RigidTransform"
    }
}

impl<B: Backend, const D: usize> CenteredTransform<B, D> for RigidTransform<B, D> {
    fn from_center_and_translation(
        center: Point<D>,
        translation: Vector<D>,
        device: &B::Device,
    ) -> Self {
        let identity = Self::identity(Some(vector_tensor(center.coords(), device)), device);
        let mut values = vec![0.0; rotation_count(D)];
        values.extend(translation.to_vec());
        identity.with_parameter_values(&values)
    }
}
