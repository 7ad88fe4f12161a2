//! Orientation of image axes in physical space.

use super::Vector;
use nalgebra::SMatrix;

/// Direction cosines: column `i` is the physical direction of image axis `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Builds a direction from row-major values, the layout DICOM and most
    /// file formats use.
    pub fn from_row_slice(values: &[f64]) -> Self {
        Self(SMatrix::from_row_slice(values))
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    ///
    /// nalgebra only offers `determinant` for dimensions it can name at the
    /// type level, so the generic case is computed here.
    pub fn determinant(&self) -> f64 {
        let mut m = self.0;
        let mut det = 1.0;
        for i in 0..D {
            let pivot = (i..D)
                .max_by(|&a, &b| m[(a, i)].abs().total_cmp(&m[(b, i)].abs()))
                .unwrap_or(i);
            if m[(pivot, i)].abs() < 1e-15 {
                return 0.0;
            }
            if pivot != i {
                m.swap_rows(i, pivot);
                det = -det;
            }
            det *= m[(i, i)];
            for r in (i + 1)..D {
                let factor = m[(r, i)] / m[(i, i)];
                for c in i..D {
                    m[(r, c)] -= factor * m[(i, c)];
                }
            }
        }
        det
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// A direction is usable for index/physical mapping only when it is
    /// finite and non-singular.
    pub fn is_invertible(&self) -> bool {
        self.0.iter().all(|v| v.is_finite()) && self.determinant().abs() > 1e-12
    }

    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        (product - SMatrix::<f64, D, D>::identity())
            .iter()
            .all(|v| v.abs() < 1e-6)
    }

    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_orthogonal_and_invertible() {
        let d = Direction::<3>::identity();
        assert!(d.is_orthogonal());
        assert!(d.is_invertible());
        assert!((d.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_direction() {
        let d = Direction::<2>::from_row_slice(&[1.0, 2.0, 2.0, 4.0]);
        assert!(!d.is_invertible());
        assert!(d.try_inverse().is_none());
    }

    #[test]
    fn test_rotation_inverse_is_transpose() {
        let (s, c) = 0.3f64.sin_cos();
        let d = Direction::<2>::from_row_slice(&[c, -s, s, c]);
        let inv = d.try_inverse().unwrap();
        assert!((inv.0 - d.0.transpose()).iter().all(|v| v.abs() < 1e-12));
        assert!(d.is_orthogonal());
    }
}
