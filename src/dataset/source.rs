//! Source-side mel features only, used for evaluation and decoding.

use super::filter::filter_jointly;
use super::loader::{NpyLoader, SharedLoader};
use super::mel::MelItem;
use super::{ensure_non_empty, find_files, load_item, Dataset, Records, Result, UttIdNaming};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Construction options for [`SourceMelDataset`].
#[derive(Clone)]
pub struct SourceMelDatasetOptions {
    pub mel_query: String,
    pub mel_loader: SharedLoader<Array2<f32>>,
    pub naming: UttIdNaming,
    pub mel_length_threshold: Option<usize>,
    pub return_utt_id: bool,
    pub allow_cache: bool,
}

impl Default for SourceMelDatasetOptions {
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

/// Source mel features under one root, in sorted path order.
#[derive(Clone)]
pub struct SourceMelDataset {
    src_files: Arc<[PathBuf]>,
    mel_loader: SharedLoader<Array2<f32>>,
    records: Records<MelItem>,
}

impl SourceMelDataset {
    pub fn new(src_root_dir: impl AsRef<Path>, options: SourceMelDatasetOptions) -> Result<Self> {
        let src_root_dir = src_root_dir.as_ref();
        let mut src_files = find_files(src_root_dir, &options.mel_query)?;
        filter_jointly(
            &mut src_files,
            &mut [],
            options.mel_loader.as_ref(),
            options.mel_length_threshold,
            "mel",
        )?;
        ensure_non_empty(&src_files, "mel", src_root_dir)?;

        let utt_ids = options.naming.utt_ids(&src_files);
        Ok(Self {
            src_files: src_files.into(),
            mel_loader: options.mel_loader,
            records: Records::new(utt_ids, options.return_utt_id, options.allow_cache),
        })
    }
}

impl Dataset for SourceMelDataset {
    type Item = MelItem;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn utt_ids(&self) -> &[String] {
        self.records.utt_ids()
    }

    fn get(&self, index: usize) -> Result<Arc<MelItem>> {
        self.records.fetch(index, |utt_id| {
            let mel = load_item(self.mel_loader.as_ref(), &self.src_files[index])?;
            Ok(MelItem { utt_id, mel })
        })
    }
}
