//! Frame-wise linear conversion model.
//!
//! Maps every source frame independently through `y = W x + b`, so output
//! length equals input length and the alignment is the identity. It has no
//! attention or stop-token network; those outputs are synthesized to keep the
//! [`VcModel`] contract.

use super::{InferenceOutput, VcModel};
use crate::config::InferenceConfig;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearParams {
    idim: Option<usize>,
    odim: Option<usize>,
}

/// `weight: [odim, idim]`, optional `bias: [odim]`.
#[derive(Debug, Clone)]
pub struct FramewiseLinear<B: Backend> {
    weight: Tensor<B, 2>,
    bias: Option<Tensor<B, 1>>,
}

impl<B: Backend> FramewiseLinear<B> {
    pub const MODEL_TYPE: &'static str = "FramewiseLinear";

    pub fn new(weight: Tensor<B, 2>, bias: Option<Tensor<B, 1>>) -> Result<Self> {
        let [odim, _] = weight.dims();
        if let Some(bias) = &bias {
            if bias.dims()[0] != odim {
                anyhow::bail!("Bias has {} entries, weight has {odim} rows", bias.dims()[0]);
            }
        }
        Ok(Self { weight, bias })
    }

    pub fn idim(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn odim(&self) -> usize {
        self.weight.dims()[0]
    }

    /// Factory registered under [`Self::MODEL_TYPE`].
    pub fn build(
        params: &serde_yaml::Value,
        state: &StateDict,
        device: &B::Device,
    ) -> Result<Box<dyn VcModel<B>>> {
        let params: LinearParams = if params.is_null() {
            LinearParams::default()
        } else {
            serde_yaml::from_value(params.clone())?
        };
        let weight = state.tensor2::<B>("weight", device)?;
        let bias = match state.get("bias") {
            Some(_) => Some(state.tensor1::<B>("bias", device)?),
            None => None,
        };
        let model = Self::new(weight, bias)?;
        for (name, expected, actual) in [
            ("idim", params.idim, model.idim()),
            ("odim", params.odim, model.odim()),
        ] {
            if let Some(expected) = expected {
                if expected != actual {
                    anyhow::bail!("model_params.{name} = {expected} but checkpoint has {actual}");
                }
            }
        }
        Ok(Box::new(model))
    }
}

impl<B: Backend> VcModel<B> for FramewiseLinear<B> {
    fn model_type(&self) -> &str {
        Self::MODEL_TYPE
    }

    fn inference(
        &self,
        feats: Tensor<B, 2>,
        _options: &InferenceConfig,
    ) -> Result<InferenceOutput<B>> {
        let [frames, idim] = feats.dims();
        if idim != self.idim() {
            anyhow::bail!("Expected {} input channels, got {idim}", self.idim());
        }
        let device = feats.device();
        let mut outs = feats.matmul(self.weight.clone().transpose());
        if let Some(bias) = &self.bias {
            outs = outs + bias.clone().unsqueeze::<2>();
        }

        let mut probs = vec![0.0_f32; frames];
        if let Some(last) = probs.last_mut() {
            *last = 1.0;
        }
        let mut diagonal = vec![0.0_f32; frames * frames];
        for t in 0..frames {
            diagonal[t * frames + t] = 1.0;
        }

        Ok(InferenceOutput {
            outs,
            probs: Tensor::from_data(TensorData::new(probs, [frames]), &device),
            att_ws: Tensor::from_data(TensorData::new(diagonal, [1, frames, frames]), &device),
        })
    }
}
