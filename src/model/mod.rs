//! Acoustic model interface and registry.
//!
//! Conversion models live behind [`VcModel`]. The decode driver only knows a
//! model by the `model_type` name in its configuration; a [`ModelRegistry`]
//! maps that name to a factory that restores the model from `model_params`
//! and checkpoint tensors.

pub mod linear;

use crate::config::InferenceConfig;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::collections::BTreeMap;

pub use linear::FramewiseLinear;

/// Everything one inference call produces.
#[derive(Debug, Clone)]
pub struct InferenceOutput<B: Backend> {
    /// Converted features, `[out_frames, channels]`, still normalized.
    pub outs: Tensor<B, 2>,
    /// Stop-token probabilities, `[out_frames]`.
    pub probs: Tensor<B, 1>,
    /// Attention weights, `[maps, out_frames, in_frames]`.
    pub att_ws: Tensor<B, 3>,
}

/// A restored sequence-to-sequence conversion model, ready for inference.
///
/// Backends used for decoding carry no autodiff state, so inference never
/// records gradients.
pub trait VcModel<B: Backend> {
    /// Registered name of the model.
    fn model_type(&self) -> &str;

    /// Convert one utterance of source features `[in_frames, channels]`.
    fn inference(&self, feats: Tensor<B, 2>, options: &InferenceConfig)
        -> Result<InferenceOutput<B>>;
}

/// Builds a model from its parameters and checkpoint tensors.
pub type ModelFactory<B> =
    fn(&serde_yaml::Value, &StateDict, &<B as Backend>::Device) -> Result<Box<dyn VcModel<B>>>;

/// Name -> factory table consulted with `model_type`.
pub struct ModelRegistry<B: Backend> {
    factories: BTreeMap<String, ModelFactory<B>>,
}

impl<B: Backend> Default for ModelRegistry<B> {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FramewiseLinear::<B>::MODEL_TYPE, FramewiseLinear::<B>::build);
        registry
    }
}

impl<B: Backend> ModelRegistry<B> {
    /// A registry with no models.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: ModelFactory<B>) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        model_type: &str,
        params: &serde_yaml::Value,
        state: &StateDict,
        device: &B::Device,
    ) -> Result<Box<dyn VcModel<B>>> {
        let factory = self.factories.get(model_type).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown model_type '{model_type}' (available: {})",
                self.names().collect::<Vec<_>>().join(", ")
            )
        })?;
        factory(params, state, device)
    }
}
