//! Paired waveform + mel dataset over a single root.

use super::error::DatasetError;
use super::filter::filter_jointly;
use super::loader::{SafetensorsLoader, SharedLoader};
use super::{ensure_non_empty, find_files, load_item, Dataset, Records, Result, UttIdNaming};
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A waveform and its mel features.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMelItem {
    pub utt_id: Option<String>,
    /// Samples, `(T,)`.
    pub audio: Array1<f32>,
    /// Features, `(T', C)`.
    pub mel: Array2<f32>,
}

/// Construction options for [`AudioMelDataset`].
///
/// The defaults read both modalities from one safetensors file per
/// utterance, under the `wave` and `feats` fields.
#[derive(Clone)]
pub struct AudioMelDatasetOptions {
    pub audio_query: String,
    pub mel_query: String,
    pub audio_loader: SharedLoader<Array1<f32>>,
    pub mel_loader: SharedLoader<Array2<f32>>,
    /// Ids are derived from the audio file names.
    pub naming: UttIdNaming,
    pub audio_length_threshold: Option<usize>,
    pub mel_length_threshold: Option<usize>,
    pub return_utt_id: bool,
    pub allow_cache: bool,
}

impl Default for AudioMelDatasetOptions {
    fn default() -> Self {
        Self {
            audio_query: "*.safetensors".to_string(),
            mel_query: "*.safetensors".to_string(),
            audio_loader: Arc::new(SafetensorsLoader::new("wave")),
            mel_loader: Arc::new(SafetensorsLoader::new("feats")),
            naming: UttIdNaming::Stem,
            audio_length_threshold: None,
            mel_length_threshold: None,
            return_utt_id: false,
            allow_cache: false,
        }
    }
}

/// Waveforms and mel features discovered under the same root.
#[derive(Clone)]
pub struct AudioMelDataset {
    audio_files: Arc<[PathBuf]>,
    mel_files: Arc<[PathBuf]>,
    audio_loader: SharedLoader<Array1<f32>>,
    mel_loader: SharedLoader<Array2<f32>>,
    records: Records<AudioMelItem>,
}

impl AudioMelDataset {
    pub fn new(root_dir: impl AsRef<Path>, options: AudioMelDatasetOptions) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let mut audio_files = find_files(root_dir, &options.audio_query)?;
        let mut mel_files = find_files(root_dir, &options.mel_query)?;
        if audio_files.len() != mel_files.len() {
            return Err(DatasetError::CountMismatch {
                left_label: "audio",
                left: audio_files.len(),
                right_label: "mel",
                right: mel_files.len(),
            });
        }

        filter_jointly(
            &mut audio_files,
            &mut [&mut mel_files],
            options.audio_loader.as_ref(),
            options.audio_length_threshold,
            "audio",
        )?;
        filter_jointly(
            &mut mel_files,
            &mut [&mut audio_files],
            options.mel_loader.as_ref(),
            options.mel_length_threshold,
            "mel",
        )?;
        ensure_non_empty(&audio_files, "audio", root_dir)?;

        let utt_ids = options.naming.utt_ids(&audio_files);
        Ok(Self {
            audio_files: audio_files.into(),
            mel_files: mel_files.into(),
            audio_loader: options.audio_loader,
            mel_loader: options.mel_loader,
            records: Records::new(utt_ids, options.return_utt_id, options.allow_cache),
        })
    }
}

impl Dataset for AudioMelDataset {
    type Item = AudioMelItem;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn utt_ids(&self) -> &[String] {
        self.records.utt_ids()
    }

    fn get(&self, index: usize) -> Result<Arc<AudioMelItem>> {
        self.records.fetch(index, |utt_id| {
            let audio = load_item(self.audio_loader.as_ref(), &self.audio_files[index])?;
            let mel = load_item(self.mel_loader.as_ref(), &self.mel_files[index])?;
            Ok(AudioMelItem {
                utt_id,
                audio,
                mel,
            })
        })
    }
}
