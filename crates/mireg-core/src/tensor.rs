//! Host/device transfer helpers shared by filters, metrics and I/O.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

/// Copies a float tensor back to the host in row-major order.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

/// Reads a scalar (single element) tensor as `f64`.
pub fn to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f64 {
    tensor
        .into_data()
        .iter::<f32>()
        .next()
        .map(f64::from)
        .unwrap_or(f64::NAN)
}

pub fn from_vec<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Builds a rank-1 integer tensor of gather/select indices.
pub fn index_tensor<B: Backend>(indices: Vec<i64>, device: &B::Device) -> Tensor<B, 1, Int> {
    let len = indices.len();
    Tensor::from_data(TensorData::new(indices, [len]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_host_roundtrip_preserves_layout() {
        let device = Default::default();
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let t = from_vec::<Backend, 2>(values.clone(), [2, 3], &device);
        assert_eq!(t.dims(), [2, 3]);
        assert_eq!(to_vec(t), values);
    }

    #[test]
    fn test_scalar_readback() {
        let device = Default::default();
        let t = Tensor::<Backend, 1>::from_floats([2.5], &device);
        assert_eq!(to_scalar(t), 2.5);
    }
}
