//! Mel-only dataset over a single root.

use super::filter::filter_jointly;
use super::loader::{NpyLoader, SharedLoader};
use super::{ensure_non_empty, find_files, load_item, Dataset, Records, Result, UttIdNaming};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single mel feature item.
#[derive(Debug, Clone, PartialEq)]
pub struct MelItem {
    /// Present only when the dataset was built with `return_utt_id`.
    pub utt_id: Option<String>,
    /// Features, `(frames, channels)`.
    pub mel: Array2<f32>,
}

/// Construction options for [`MelDataset`].
#[derive(Clone)]
pub struct MelDatasetOptions {
    pub mel_query: String,
    pub mel_loader: SharedLoader<Array2<f32>>,
    pub naming: UttIdNaming,
    pub mel_length_threshold: Option<usize>,
    pub return_utt_id: bool,
    pub allow_cache: bool,
}

impl Default for MelDatasetOptions {
    fn default() -> Self {
        Self {
            mel_query: "*-feats.npy".to_string(),
            mel_loader: Arc::new(NpyLoader),
            naming: UttIdNaming::flat_feats(),
            mel_length_threshold: None,
            return_utt_id: false,
            allow_cache: false,
        }
    }
}

/// Mel features discovered under one root.
#[derive(Clone)]
pub struct MelDataset {
    mel_files: Arc<[PathBuf]>,
    mel_loader: SharedLoader<Array2<f32>>,
    records: Records<MelItem>,
}

impl MelDataset {
    pub fn new(root_dir: impl AsRef<Path>, options: MelDatasetOptions) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let mut mel_files = find_files(root_dir, &options.mel_query)?;
        filter_jointly(
            &mut mel_files,
            &mut [],
            options.mel_loader.as_ref(),
            options.mel_length_threshold,
            "mel",
        )?;
        ensure_non_empty(&mel_files, "mel", root_dir)?;

        let utt_ids = options.naming.utt_ids(&mel_files);
        Ok(Self {
            mel_files: mel_files.into(),
            mel_loader: options.mel_loader,
            records: Records::new(utt_ids, options.return_utt_id, options.allow_cache),
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.mel_files
    }
}

impl Dataset for MelDataset {
    type Item = MelItem;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn utt_ids(&self) -> &[String] {
        self.records.utt_ids()
    }

    fn get(&self, index: usize) -> Result<Arc<MelItem>> {
        self.records.fetch(index, |utt_id| {
            let mel = load_item(self.mel_loader.as_ref(), &self.mel_files[index])?;
            Ok(MelItem { utt_id, mel })
        })
    }
}
