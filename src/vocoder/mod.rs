//! Waveform synthesis from converted features.
//!
//! A vocoder is two things: a [`WaveGenerator`] network restored from its own
//! checkpoint, and an adapter that prepares model output for it. Adapters
//! differ in how they treat feature statistics:
//!
//! * [`StatsVocoder`] denormalizes with the target statistics and
//!   renormalizes with the statistics the generator was trained on.
//! * [`S3prlFeat2Wav`] denormalizes with the target statistics and feeds the
//!   raw features to the generator, which normalizes internally.

mod adapter;
pub mod projection;

use crate::config::{self, GeneratorConfig, VocoderConfig};
use crate::download::{fetch_artifact, fetch_sibling};
use crate::perf::{self, Metric};
use crate::stats::FeatStats;
use crate::weights::{load_state_dict, StateDict};
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::collections::BTreeMap;

pub use adapter::{S3prlFeat2Wav, StatsVocoder};
pub use projection::FrameProjection;

/// Feature-to-sample network.
pub trait WaveGenerator<B: Backend> {
    /// `[frames, channels]` features to mono samples.
    fn generate(&self, feats: Tensor<B, 2>) -> Result<Tensor<B, 1>>;
}

/// Turns (normalized) model output into a waveform.
pub trait Vocoder<B: Backend> {
    /// Samples and their rate in Hz.
    fn decode(&self, outs: Tensor<B, 2>) -> Result<(Vec<f32>, u32)>;
}

pub type GeneratorFactory<B> = fn(
    &GeneratorConfig,
    &StateDict,
    &<B as Backend>::Device,
) -> Result<Box<dyn WaveGenerator<B>>>;

/// Name -> factory table consulted with `generator_type`.
pub struct GeneratorRegistry<B: Backend> {
    factories: BTreeMap<String, GeneratorFactory<B>>,
}

impl<B: Backend> Default for GeneratorRegistry<B> {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FrameProjection::<B>::GENERATOR_TYPE, FrameProjection::<B>::build);
        registry
    }
}

impl<B: Backend> GeneratorRegistry<B> {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: GeneratorFactory<B>) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        config: &GeneratorConfig,
        state: &StateDict,
        device: &B::Device,
    ) -> Result<Box<dyn WaveGenerator<B>>> {
        let factory = self.factories.get(&config.generator_type).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown generator_type '{}' (available: {})",
                config.generator_type,
                self.names().collect::<Vec<_>>().join(", ")
            )
        })?;
        factory(config, state, device)
    }
}

/// Adapter selected by `vocoder.vocoder_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocoderKind {
    /// Generators trained on their own normalized features (the default).
    Normalized,
    /// `s3prl_vc`: generators consuming raw features.
    S3prl,
}

impl VocoderKind {
    pub fn from_type(vocoder_type: &str) -> Self {
        if vocoder_type == "s3prl_vc" {
            Self::S3prl
        } else {
            Self::Normalized
        }
    }

    /// Tensor-name prefix of the generator inside its checkpoint.
    pub fn checkpoint_prefix(self) -> &'static str {
        match self {
            Self::Normalized => "generator.",
            Self::S3prl => "model.",
        }
    }

    fn default_sample_rate(self) -> Option<u32> {
        match self {
            Self::Normalized => None,
            Self::S3prl => Some(16_000),
        }
    }
}

/// Restore the vocoder described by the `vocoder` configuration section.
///
/// `trg_stats` are the statistics the acoustic model output is normalized
/// with. The generator YAML defaults to `config.yml` beside its checkpoint.
pub fn build_vocoder<B: Backend>(
    section: &VocoderConfig,
    trg_stats: FeatStats,
    registry: &GeneratorRegistry<B>,
    device: &B::Device,
) -> Result<Box<dyn Vocoder<B>>> {
    let _span = perf::span(Metric::VocoderRestore);
    let kind = VocoderKind::from_type(&section.vocoder_type);

    let checkpoint = fetch_artifact(&section.checkpoint)?;
    let config_path = match &section.config {
        Some(location) => fetch_artifact(location)?,
        None => fetch_sibling(&section.checkpoint, config::DEFAULT_CONFIG_NAME)?,
    };
    let generator_config = config::load_generator_config(&config_path)?;
    let stats = FeatStats::load(fetch_artifact(&section.stats)?)?;
    if stats.dim() != trg_stats.dim() {
        anyhow::bail!(
            "Vocoder stats have {} channels, target stats have {}",
            stats.dim(),
            trg_stats.dim()
        );
    }

    let sample_rate = generator_config
        .sampling_rate
        .or(kind.default_sample_rate())
        .ok_or_else(|| {
            anyhow::anyhow!("sampling_rate missing from {}", config_path.display())
        })?;
    let state = load_state_dict(&checkpoint, kind.checkpoint_prefix())?;
    let generator = registry.build(&generator_config, &state, device)?;
    log::info!(
        "Loaded {} vocoder ({kind:?}) from {}.",
        generator_config.generator_type,
        checkpoint.display()
    );

    Ok(match kind {
        VocoderKind::Normalized => Box::new(StatsVocoder::new(
            generator,
            trg_stats,
            stats,
            sample_rate,
        )),
        VocoderKind::S3prl => Box::new(S3prlFeat2Wav::new(generator, trg_stats, sample_rate)),
    })
}
