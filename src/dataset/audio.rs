//! Waveform-only dataset over a single root.

use super::filter::filter_jointly;
use super::loader::{NpyLoader, SharedLoader};
use super::{ensure_non_empty, find_files, load_item, Dataset, Records, Result, UttIdNaming};
use ndarray::Array1;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single waveform item.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioItem {
    pub utt_id: Option<String>,
    /// Samples, `(T,)`.
    pub audio: Array1<f32>,
}

/// Construction options for [`AudioDataset`].
#[derive(Clone)]
pub struct AudioDatasetOptions {
    pub audio_query: String,
    pub audio_loader: SharedLoader<Array1<f32>>,
    pub naming: UttIdNaming,
    pub audio_length_threshold: Option<usize>,
    pub return_utt_id: bool,
    pub allow_cache: bool,
}

impl Default for AudioDatasetOptions {
    fn default() -> Self {
        Self {
            audio_query: "*-wave.npy".to_string(),
            audio_loader: Arc::new(NpyLoader),
            naming: UttIdNaming::flat_wave(),
            audio_length_threshold: None,
            return_utt_id: false,
            allow_cache: false,
        }
    }
}

/// Waveforms discovered under one root.
#[derive(Clone)]
pub struct AudioDataset {
    audio_files: Arc<[PathBuf]>,
    audio_loader: SharedLoader<Array1<f32>>,
    records: Records<AudioItem>,
}

impl AudioDataset {
    pub fn new(root_dir: impl AsRef<Path>, options: AudioDatasetOptions) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let mut audio_files = find_files(root_dir, &options.audio_query)?;
        filter_jointly(
            &mut audio_files,
            &mut [],
            options.audio_loader.as_ref(),
            options.audio_length_threshold,
            "audio",
        )?;
        ensure_non_empty(&audio_files, "audio", root_dir)?;

        let utt_ids = options.naming.utt_ids(&audio_files);
        Ok(Self {
            audio_files: audio_files.into(),
            audio_loader: options.audio_loader,
            records: Records::new(utt_ids, options.return_utt_id, options.allow_cache),
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.audio_files
    }
}

impl Dataset for AudioDataset {
    type Item = AudioItem;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn utt_ids(&self) -> &[String] {
        self.records.utt_ids()
    }

    fn get(&self, index: usize) -> Result<Arc<AudioItem>> {
        self.records.fetch(index, |utt_id| {
            let audio = load_item(self.audio_loader.as_ref(), &self.audio_files[index])?;
            Ok(AudioItem { utt_id, audio })
        })
    }
}
