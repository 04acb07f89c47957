//! Checkpoint loading and tensor name mapping.
//!
//! Checkpoints are safetensors files whose tensor names carry the owning
//! component as a prefix (`model.` for acoustic models, `generator.` for
//! vocoders). Loading strips the prefix so factories see their own names.

use crate::container::{self, TensorData};
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData as BurnData};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix of acoustic-model tensors inside a checkpoint.
pub const MODEL_PREFIX: &str = "model.";

/// Tensors of one component, keyed by their name without prefix.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: BTreeMap<String, TensorData>,
}

impl StateDict {
    pub fn new(tensors: BTreeMap<String, TensorData>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.tensors.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&TensorData> {
        self.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            anyhow::anyhow!("Missing tensor '{name}' in checkpoint (found: {known:?})")
        })
    }

    /// Materialize a 1D tensor on `device`.
    pub fn tensor1<B: Backend>(&self, name: &str, device: &B::Device) -> Result<Tensor<B, 1>> {
        let data = self.require(name)?;
        if data.shape.len() != 1 {
            anyhow::bail!("Expected 1D tensor '{name}', got shape {:?}", data.shape);
        }
        Ok(Tensor::from_data(
            BurnData::new(data.values.clone(), [data.shape[0]]),
            device,
        ))
    }

    /// Materialize a 2D tensor on `device`.
    pub fn tensor2<B: Backend>(&self, name: &str, device: &B::Device) -> Result<Tensor<B, 2>> {
        let data = self.require(name)?;
        if data.shape.len() != 2 {
            anyhow::bail!("Expected 2D tensor '{name}', got shape {:?}", data.shape);
        }
        Ok(Tensor::from_data(
            BurnData::new(data.values.clone(), [data.shape[0], data.shape[1]]),
            device,
        ))
    }
}

/// Load every tensor under `prefix` from a checkpoint, with the prefix removed.
///
/// # Errors
///
/// Fails when the file can't be read or holds no tensor under `prefix`.
pub fn load_state_dict(path: impl AsRef<Path>, prefix: &str) -> Result<StateDict> {
    let path = path.as_ref();
    let mut tensors = BTreeMap::new();
    for (name, data) in container::read_all(path)? {
        if let Some(rest) = name.strip_prefix(prefix) {
            tensors.insert(rest.to_string(), data);
        }
    }
    if tensors.is_empty() {
        anyhow::bail!(
            "Checkpoint {} has no '{}' entries",
            path.display(),
            prefix.trim_end_matches('.')
        );
    }
    Ok(StateDict::new(tensors))
}

/// Load the acoustic model state from a training checkpoint.
pub fn load_model_state_dict(path: impl AsRef<Path>) -> Result<StateDict> {
    load_state_dict(path, MODEL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::write_tensors;
    use burn_ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn model_prefix_is_stripped_and_others_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.safetensors");
        let weight = TensorData::new(vec![1, 2], vec![0.5, 1.5]);
        let step = TensorData::new(vec![1], vec![1000.0]);
        write_tensors(
            &path,
            [("model.weight", &weight), ("optimizer.step", &step)],
        )
        .expect("write");

        let state = load_model_state_dict(&path).expect("load");
        assert_eq!(state.names().collect::<Vec<_>>(), vec!["weight"]);

        let device = NdArrayDevice::default();
        let tensor = state
            .tensor2::<NdArray<f32>>("weight", &device)
            .expect("tensor");
        assert_eq!(tensor.dims(), [1, 2]);
        assert!(state.tensor1::<NdArray<f32>>("weight", &device).is_err());
    }

    #[test]
    fn checkpoint_without_model_entry_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.safetensors");
        let step = TensorData::new(vec![1], vec![1.0]);
        write_tensors(&path, [("optimizer.step", &step)]).expect("write");

        let err = load_model_state_dict(&path).unwrap_err();
        assert!(err.to_string().contains("no 'model' entries"));
    }

    #[test]
    fn missing_tensor_lists_known_names() {
        let state = StateDict::new(
            [("bias".to_string(), TensorData::new(vec![1], vec![0.0]))]
                .into_iter()
                .collect(),
        );
        let err = state.require("weight").unwrap_err();
        assert!(err.to_string().contains("bias"));
    }
}
