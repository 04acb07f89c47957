//! # melvc - decoding for sequence-to-sequence voice conversion
//!
//! `melvc` turns dumped source mel features into converted features and,
//! optionally, waveforms. It covers the data side of a voice conversion
//! recipe and the decode driver; conversion models and vocoder networks plug
//! in behind narrow traits.
//!
//! ## Architecture Overview
//!
//! 1. **Datasets** ([`dataset`]): discover per-utterance files under a corpus
//!    root, filter them by length, check pairing integrity and load items
//!    lazily with an optional cache shared by every clone.
//!
//! 2. **Models** ([`model`]): a [`VcModel`] is restored by name from a
//!    [`ModelRegistry`] and maps source features to converted features,
//!    stop-token probabilities and attention weights.
//!
//! 3. **Vocoders** ([`vocoder`]): a waveform generator plus an adapter that
//!    moves converted features into the generator's normalization.
//!
//! 4. **Decode driver** ([`decode`]): configuration resolution, the
//!    per-utterance loop and every artifact written along the way.
//!
//! ## Quick Start
//!
//! ```no_run
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use melvc::decode::{decode, DecodeArgs};
//! use std::sync::atomic::AtomicBool;
//!
//! let args = DecodeArgs::new(
//!     "dump/eval/norm_trg",
//!     "exp/vc/checkpoint-50000steps.safetensors",
//!     "dump/train/stats.safetensors",
//!     "exp/vc/results",
//! );
//! let summary = decode::<NdArray<f32>>(args, &NdArrayDevice::default(), &AtomicBool::new(false))
//!     .unwrap();
//! println!("decoded {} utterances", summary.utterances);
//! ```
//!
//! ## Datasets
//!
//! ```no_run
//! use melvc::dataset::{Dataset, ParallelMelDataset, ParallelMelDatasetOptions};
//!
//! let dataset = ParallelMelDataset::new(
//!     "dump/train/src",
//!     "dump/train/trg",
//!     ParallelMelDatasetOptions {
//!         return_utt_id: true,
//!         allow_cache: true,
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//! for item in dataset.iter() {
//!     let item = item.unwrap();
//!     println!("{:?}: {} -> {}", item.utt_id, item.src_mel.nrows(), item.trg_mel.nrows());
//! }
//! ```

pub mod audio;
pub mod config;
pub mod container;
pub mod dataset;
pub mod decode;
pub mod download;
pub mod model;
pub mod perf;
pub mod plot;
pub mod stats;
pub mod tensor;
pub mod vocoder;
pub mod weights;

pub use config::{DecodeConfig, InferenceConfig};
pub use dataset::{Dataset, DatasetError};
pub use decode::{decode, DecodeArgs, DecodeSession, DecodeSummary};
pub use download::fetch_artifact;
pub use model::{ModelRegistry, VcModel};
pub use stats::FeatStats;
pub use vocoder::{GeneratorRegistry, Vocoder};
