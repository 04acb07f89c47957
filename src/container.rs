//! SafeTensors container helpers for features, statistics and checkpoints.
//!
//! Every artifact the pipeline reads or writes is a flat map from field name
//! to `f32` tensor. These helpers convert between that map and `ndarray`
//! arrays.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Raw tensor payload extracted from a SafeTensors file, decoded to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    /// Shape as a list of dimensions.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub values: Vec<f32>,
}

impl TensorData {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// Decode a safetensors view into `f32` values.
    pub fn from_safetensor(name: &str, tensor: TensorView<'_>) -> Result<Self> {
        let values = decode_f32(name, tensor.dtype(), tensor.data())?;
        Ok(Self {
            shape: tensor.shape().to_vec(),
            values,
        })
    }

    pub fn into_array(self) -> Result<ArrayD<f32>> {
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.values)?)
    }
}

fn decode_f32(name: &str, dtype: Dtype, bytes: &[u8]) -> Result<Vec<f32>> {
    match dtype {
        Dtype::F32 => Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()),
        Dtype::BF16 => Ok(bytes
            .chunks_exact(2)
            .map(|chunk| {
                let bits = u16::from_le_bytes([chunk[0], chunk[1]]) as u32;
                f32::from_bits(bits << 16)
            })
            .collect()),
        Dtype::F64 => Ok(bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw) as f32
            })
            .collect()),
        other => anyhow::bail!("Unsupported dtype {other:?} for tensor '{name}'"),
    }
}

/// Read one named tensor from a container file.
pub fn read_tensor(path: impl AsRef<Path>, key: &str) -> Result<TensorData> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let view = tensors
        .tensor(key)
        .map_err(|_| anyhow::anyhow!("Field '{key}' not found in {}", path.display()))?;
    TensorData::from_safetensor(key, view)
}

/// Read every tensor in a container file.
pub fn read_all(path: impl AsRef<Path>) -> Result<BTreeMap<String, TensorData>> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let mut out = BTreeMap::new();
    for (name, view) in tensors.tensors() {
        let data = TensorData::from_safetensor(&name, view)?;
        out.insert(name, data);
    }
    Ok(out)
}

/// Read a `(frames, channels)` field.
pub fn read_array2(path: impl AsRef<Path>, key: &str) -> Result<Array2<f32>> {
    let tensor = read_tensor(path, key)?;
    if tensor.shape.len() != 2 {
        anyhow::bail!(
            "Expected 2D tensor for '{key}', got shape {:?}",
            tensor.shape
        );
    }
    Ok(Array2::from_shape_vec(
        (tensor.shape[0], tensor.shape[1]),
        tensor.values,
    )?)
}

/// Read a 1D field. A `(1, n)` or `(n, 1)` tensor is flattened.
pub fn read_array1(path: impl AsRef<Path>, key: &str) -> Result<Array1<f32>> {
    let tensor = read_tensor(path, key)?;
    let numel: usize = tensor.shape.iter().product();
    let non_unit = tensor.shape.iter().filter(|&&dim| dim != 1).count();
    if non_unit > 1 {
        anyhow::bail!(
            "Expected 1D tensor for '{key}', got shape {:?}",
            tensor.shape
        );
    }
    debug_assert_eq!(numel, tensor.values.len());
    Ok(Array1::from(tensor.values))
}

/// Serialize named `f32` tensors into a container file.
pub fn write_tensors<'a>(
    path: impl AsRef<Path>,
    tensors: impl IntoIterator<Item = (&'a str, &'a TensorData)>,
) -> Result<()> {
    let path = path.as_ref();
    let tensors: Vec<(&str, &TensorData)> = tensors.into_iter().collect();
    let buffers: Vec<Vec<u8>> = tensors
        .iter()
        .map(|(_, tensor)| tensor.values.iter().flat_map(|v| v.to_le_bytes()).collect())
        .collect();
    let mut views = HashMap::new();
    for ((name, tensor), bytes) in tensors.iter().zip(buffers.iter()) {
        let view = TensorView::new(Dtype::F32, tensor.shape.clone(), bytes)?;
        views.insert((*name).to_string(), view);
    }
    let serialized = safetensors::serialize(&views, &None)?;
    fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write a single `(frames, channels)` field.
pub fn write_array2(path: impl AsRef<Path>, key: &str, array: &Array2<f32>) -> Result<()> {
    let tensor = TensorData::new(
        vec![array.nrows(), array.ncols()],
        array.iter().copied().collect(),
    );
    write_tensors(path, [(key, &tensor)])
}

/// Write a single 1D field.
pub fn write_array1(path: impl AsRef<Path>, key: &str, array: &Array1<f32>) -> Result<()> {
    let tensor = TensorData::new(vec![array.len()], array.to_vec());
    write_tensors(path, [(key, &tensor)])
}
