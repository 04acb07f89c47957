//! Frame-wise projection generator.
//!
//! Every feature frame becomes `hop_size` samples through a single linear map
//! squashed by `tanh`. It reproduces the shape contract of a neural vocoder
//! (`frames * hop_size` samples in `[-1, 1]`) without any synthesis quality.

use super::WaveGenerator;
use crate::config::GeneratorConfig;
use crate::weights::StateDict;
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// `weight: [hop_size, channels]`, optional `bias: [hop_size]`.
#[derive(Debug, Clone)]
pub struct FrameProjection<B: Backend> {
    weight: Tensor<B, 2>,
    bias: Option<Tensor<B, 1>>,
}

impl<B: Backend> FrameProjection<B> {
    pub const GENERATOR_TYPE: &'static str = "FrameProjection";

    pub fn hop_size(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn channels(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn build(
        config: &GeneratorConfig,
        state: &StateDict,
        device: &B::Device,
    ) -> Result<Box<dyn WaveGenerator<B>>> {
        let weight = state.tensor2::<B>("weight", device)?;
        let bias = match state.get("bias") {
            Some(_) => Some(state.tensor1::<B>("bias", device)?),
            None => None,
        };
        let generator = Self { weight, bias };
        if let Some(bias) = &generator.bias {
            if bias.dims()[0] != generator.hop_size() {
                anyhow::bail!(
                    "Generator bias has {} entries, hop_size is {}",
                    bias.dims()[0],
                    generator.hop_size()
                );
            }
        }
        if let Some(hop_size) = config.hop_size {
            if hop_size != generator.hop_size() {
                anyhow::bail!(
                    "hop_size = {hop_size} but generator weight produces {} samples per frame",
                    generator.hop_size()
                );
            }
        }
        Ok(Box::new(generator))
    }
}

impl<B: Backend> WaveGenerator<B> for FrameProjection<B> {
    fn generate(&self, feats: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        let [frames, channels] = feats.dims();
        if channels != self.channels() {
            anyhow::bail!(
                "Generator expects {} channels, got {channels}",
                self.channels()
            );
        }
        let mut blocks = feats.matmul(self.weight.clone().transpose());
        if let Some(bias) = &self.bias {
            blocks = blocks + bias.clone().unsqueeze::<2>();
        }
        Ok(blocks.tanh().reshape([frames * self.hop_size()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TensorData;
    use crate::tensor::{array2_to_tensor, tensor_to_array1};
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::array;

    type TestBackend = NdArray<f32>;

    fn state() -> StateDict {
        StateDict::new(
            [(
                "weight".to_string(),
                TensorData::new(vec![3, 2], vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            )]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn each_frame_yields_one_hop() {
        let device = NdArrayDevice::default();
        let config: GeneratorConfig = serde_yaml::from_str("hop_size: 3").expect("yaml");
        let generator =
            FrameProjection::<TestBackend>::build(&config, &state(), &device).expect("build");
        let feats = array![[0.0_f32, 0.0], [100.0, -100.0]];
        let samples = tensor_to_array1(
            generator
                .generate(array2_to_tensor(&feats, &device))
                .expect("generate"),
        )
        .expect("samples");

        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!((samples[3] - 1.0).abs() < 1e-6);
        assert!((samples[4] + 1.0).abs() < 1e-6);
        assert_eq!(samples[5], 0.0);
    }

    #[test]
    fn hop_size_must_match_weight() {
        let config: GeneratorConfig = serde_yaml::from_str("hop_size: 256").expect("yaml");
        let err = FrameProjection::<TestBackend>::build(&config, &state(), &Default::default())
            .err()
            .expect("mismatch");
        assert!(err.to_string().contains("hop_size = 256"));
    }
}
