//! Feed-forward networks and tensor/record helpers shared by learning agents.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Record, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{Result, RlError};

/// Two-hidden-layer MLP with ReLU activations.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    input: Linear<B>,
    hidden: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    pub fn new(input_dim: usize, hidden_dim: usize, output_dim: usize, device: &B::Device) -> Self {
        Self {
            input: LinearConfig::new(input_dim, hidden_dim).init(device),
            hidden: LinearConfig::new(hidden_dim, hidden_dim).init(device),
            output: LinearConfig::new(hidden_dim, output_dim).init(device),
        }
    }

    /// `[batch, input_dim]` → `[batch, output_dim]`
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.input.forward(x));
        let x = relu(self.hidden.forward(x));
        self.output.forward(x)
    }
}

/// Stack equally sized rows into a `[rows, cols]` tensor.
pub fn rows_to_tensor<B: Backend>(rows: &[&[f32]], cols: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut flat = Vec::with_capacity(rows.len() * cols);
    for row in rows {
        flat.extend_from_slice(row);
    }
    Tensor::from_data(TensorData::new(flat, [rows.len(), cols]), device)
}

pub fn vec_to_tensor<B: Backend>(values: Vec<f32>, device: &B::Device) -> Tensor<B, 1> {
    let n = values.len();
    Tensor::from_data(TensorData::new(values, [n]), device)
}

/// Column of indices, `[n, 1]`, for `gather` along dim 1.
pub fn indices_to_tensor<B: Backend>(indices: &[u32], device: &B::Device) -> Tensor<B, 2, Int> {
    let values: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    let n = values.len();
    Tensor::from_data(TensorData::new(values, [n, 1]), device)
}

pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| RlError::Recorder(format!("tensor readback failed: {:?}", e)))
}

pub fn tensor_to_scalar<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    tensor_to_vec(tensor)?
        .first()
        .copied()
        .ok_or_else(|| RlError::Recorder("empty scalar tensor".to_string()))
}

/// Index of the largest element (first on ties).
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        })
        .0
}

/// Serialize a burn record to bytes.
pub fn record_to_bytes<B: Backend, R: Record<B>>(record: R) -> Result<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::record(&recorder, record, ()).map_err(|e| RlError::Recorder(e.to_string()))
}

pub fn record_from_bytes<B: Backend, R: Record<B>>(bytes: Vec<u8>, device: &B::Device) -> Result<R> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::load(&recorder, bytes, device).map_err(|e| RlError::Recorder(e.to_string()))
}

pub fn module_to_bytes<B: Backend, M: Module<B>>(module: &M) -> Result<Vec<u8>> {
    record_to_bytes::<B, _>(module.clone().into_record())
}

/// Load weights saved by [`module_to_bytes`] into `template`.
pub fn module_from_bytes<B: Backend, M: Module<B>>(
    template: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M> {
    let record = record_from_bytes::<B, M::Record>(bytes, device)?;
    Ok(template.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_mlp_shapes() {
        let device = Default::default();
        let net = Mlp::<B>::new(4, 16, 2, &device);
        let x = rows_to_tensor::<B>(&[&[0.1, 0.2, 0.3, 0.4], &[0.0; 4]], 4, &device);
        assert_eq!(net.forward(x).dims(), [2, 2]);
    }

    #[test]
    fn test_module_bytes_roundtrip() {
        let device = Default::default();
        let net = Mlp::<B>::new(3, 8, 2, &device);
        let other = Mlp::<B>::new(3, 8, 2, &device);
        let bytes = module_to_bytes::<B, _>(&net).unwrap();
        let loaded = module_from_bytes::<B, _>(other, bytes, &device).unwrap();

        let x = rows_to_tensor::<B>(&[&[1.0, -1.0, 0.5]], 3, &device);
        let a = tensor_to_vec(net.forward(x.clone())).unwrap();
        let b = tensor_to_vec(loaded.forward(x)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, -1.0]), 1);
        assert_eq!(argmax(&[-2.0]), 0);
    }
}
