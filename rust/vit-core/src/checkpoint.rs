//! Reading and writing checkpoints in the safetensors format.

use std::path::Path;

use half::{bf16, f16};
use ndarray::{ArrayD, IxDyn};
use safetensors::SafeTensors;
use safetensors::tensor::{Dtype, TensorView};
use tracing::debug;

use crate::error::{Error, Result};
use crate::params::ParamMap;

/// Read every tensor of a safetensors file as f32.
pub fn load(path: impl AsRef<Path>) -> Result<ParamMap> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let params = from_bytes(&bytes)?;
    debug!(path = %path.display(), tensors = params.len(), "loaded checkpoint");
    Ok(params)
}

/// Parse a safetensors buffer, converting F16, BF16 and F64 to f32.
pub fn from_bytes(bytes: &[u8]) -> Result<ParamMap> {
    let st = SafeTensors::deserialize(bytes)?;
    let mut params = ParamMap::new();
    for (key, tensor) in st.tensors() {
        let data = tensor.data();
        let values: Vec<f32> = match tensor.dtype() {
            Dtype::F32 => data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F16 => data
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::BF16 => data
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::F64 => data
                .chunks_exact(8)
                .map(|b| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(b);
                    f64::from_le_bytes(raw) as f32
                })
                .collect(),
            other => {
                return Err(Error::UnsupportedDType {
                    key,
                    dtype: format!("{:?}", other),
                });
            }
        };
        let array = ArrayD::from_shape_vec(IxDyn(tensor.shape()), values)?;
        params.insert(key, array);
    }
    Ok(params)
}

/// Serialize parameters as an f32 safetensors buffer.
pub fn to_bytes<'a, I>(params: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a ArrayD<f32>)>,
{
    let buffers: Vec<(&str, Vec<usize>, Vec<u8>)> = params
        .into_iter()
        .map(|(key, value)| {
            let bytes = value.iter().flat_map(|v| v.to_le_bytes()).collect();
            (key, value.shape().to_vec(), bytes)
        })
        .collect();
    let mut views = Vec::with_capacity(buffers.len());
    for (key, shape, bytes) in &buffers {
        views.push((*key, TensorView::new(Dtype::F32, shape.clone(), bytes)?));
    }
    Ok(safetensors::serialize(views.iter().map(|(k, v)| (*k, v)), &None)?)
}

/// Write parameters to a safetensors file.
pub fn save<'a, I>(params: I, path: impl AsRef<Path>) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a ArrayD<f32>)>,
{
    let path = path.as_ref();
    let bytes = to_bytes(params)?;
    std::fs::write(path, bytes).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
