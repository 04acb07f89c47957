//! Source/target mel pairs for parallel voice conversion.

use super::error::DatasetError;
use super::filter::filter_jointly;
use super::loader::{NpyLoader, SharedLoader};
use super::{ensure_non_empty, find_files, load_item, Dataset, Records, Result, UttIdNaming};
use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source and target features of one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelMelItem {
    pub utt_id: Option<String>,
    pub src_mel: Array2<f32>,
    pub trg_mel: Array2<f32>,
}

/// Construction options for [`ParallelMelDataset`].
#[derive(Clone)]
pub struct ParallelMelDatasetOptions {
    /// Query used under both roots.
    pub mel_query: String,
    pub src_loader: SharedLoader<Array2<f32>>,
    pub trg_loader: SharedLoader<Array2<f32>>,
    /// Applied to both sides; ids must line up after derivation.
    pub naming: UttIdNaming,
    pub src_length_threshold: Option<usize>,
    pub trg_length_threshold: Option<usize>,
    pub return_utt_id: bool,
    pub allow_cache: bool,
}

impl Default for ParallelMelDatasetOptions {
    fn default() -> Self {
        Self {
            mel_query: "*-feats.npy".to_string(),
            src_loader: Arc::new(NpyLoader),
            trg_loader: Arc::new(NpyLoader),
            naming: UttIdNaming::flat_feats(),
            src_length_threshold: None,
            trg_length_threshold: None,
            return_utt_id: false,
            allow_cache: false,
        }
    }
}

/// Two corpora aligned by utterance id.
#[derive(Clone)]
pub struct ParallelMelDataset {
    src_files: Arc<[PathBuf]>,
    trg_files: Arc<[PathBuf]>,
    src_loader: SharedLoader<Array2<f32>>,
    trg_loader: SharedLoader<Array2<f32>>,
    records: Records<ParallelMelItem>,
}

impl ParallelMelDataset {
    pub fn new(
        src_root_dir: impl AsRef<Path>,
        trg_root_dir: impl AsRef<Path>,
        options: ParallelMelDatasetOptions,
    ) -> Result<Self> {
        let src_root_dir = src_root_dir.as_ref();
        let trg_root_dir = trg_root_dir.as_ref();
        let mut src_files = find_files(src_root_dir, &options.mel_query)?;
        let trg_found = find_files(trg_root_dir, &options.mel_query)?;
        ensure_non_empty(&src_files, "mel", src_root_dir)?;
        ensure_non_empty(&trg_found, "mel", trg_root_dir)?;

        let src_ids = options.naming.utt_ids(&src_files);
        let trg_ids = options.naming.utt_ids(&trg_found);
        let src_set = unique_ids(&src_ids, src_root_dir)?;
        let trg_set = unique_ids(&trg_ids, trg_root_dir)?;
        if src_set != trg_set {
            return Err(DatasetError::UttIdMismatch {
                src_count: src_set.len(),
                trg_count: trg_set.len(),
                only_src: src_set.difference(&trg_set).cloned().collect(),
                only_trg: trg_set.difference(&src_set).cloned().collect(),
            });
        }

        // Pair by id rather than by position.
        let trg_by_id: HashMap<&str, &PathBuf> = trg_ids
            .iter()
            .map(String::as_str)
            .zip(trg_found.iter())
            .collect();
        let mut trg_files: Vec<PathBuf> = src_ids
            .iter()
            .map(|id| trg_by_id[id.as_str()].clone())
            .collect();

        filter_jointly(
            &mut src_files,
            &mut [&mut trg_files],
            options.src_loader.as_ref(),
            options.src_length_threshold,
            "source mel",
        )?;
        filter_jointly(
            &mut trg_files,
            &mut [&mut src_files],
            options.trg_loader.as_ref(),
            options.trg_length_threshold,
            "target mel",
        )?;
        ensure_non_empty(&src_files, "mel", src_root_dir)?;

        let utt_ids = options.naming.utt_ids(&src_files);
        Ok(Self {
            src_files: src_files.into(),
            trg_files: trg_files.into(),
            src_loader: options.src_loader,
            trg_loader: options.trg_loader,
            records: Records::new(utt_ids, options.return_utt_id, options.allow_cache),
        })
    }

    /// `(source, target)` path pairs in index order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.src_files
            .iter()
            .zip(self.trg_files.iter())
            .map(|(src, trg)| (src.as_path(), trg.as_path()))
    }
}

fn unique_ids(ids: &[String], root: &Path) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for id in ids {
        if !set.insert(id.clone()) {
            return Err(DatasetError::DuplicateUttId {
                utt_id: id.clone(),
                root: root.to_path_buf(),
            });
        }
    }
    Ok(set)
}

impl Dataset for ParallelMelDataset {
    type Item = ParallelMelItem;

    fn len(&self) -> usize {
        self.records.len()
    }

    fn utt_ids(&self) -> &[String] {
        self.records.utt_ids()
    }

    fn get(&self, index: usize) -> Result<Arc<ParallelMelItem>> {
        self.records.fetch(index, |utt_id| {
            let src_mel = load_item(self.src_loader.as_ref(), &self.src_files[index])?;
            let trg_mel = load_item(self.trg_loader.as_ref(), &self.trg_files[index])?;
            Ok(ParallelMelItem {
                utt_id,
                src_mel,
                trg_mel,
            })
        })
    }
}
