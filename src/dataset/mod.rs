//! Corpus discovery and lazy per-utterance loading.
//!
//! A dataset is built once over one or two corpus roots. Construction finds
//! the files, optionally filters them by length, checks corpus integrity and
//! derives utterance ids. Items are only read from disk when [`Dataset::get`]
//! is called, and are memoized when caching is enabled.
//!
//! | Variant | Item |
//! |---|---|
//! | [`AudioMelDataset`] | waveform + mel from one root |
//! | [`AudioDataset`] | waveform |
//! | [`MelDataset`] | mel |
//! | [`ParallelMelDataset`] | source + target mel paired by utterance id |
//! | [`SourceMelDataset`] | source mel, for evaluation and decoding |

pub mod audio;
pub mod audio_mel;
pub mod cache;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod loader;
pub mod mel;
pub mod naming;
pub mod parallel;
pub mod source;

pub use audio::{AudioDataset, AudioDatasetOptions, AudioItem};
pub use audio_mel::{AudioMelDataset, AudioMelDatasetOptions, AudioMelItem};
pub use cache::ItemCache;
pub use discovery::find_files;
pub use error::{DatasetError, Result};
pub use loader::{FeatLoader, NpyLoader, SafetensorsLoader, SharedLoader, WavLoader};
pub use mel::{MelDataset, MelDatasetOptions, MelItem};
pub use naming::UttIdNaming;
pub use parallel::{ParallelMelDataset, ParallelMelDatasetOptions, ParallelMelItem};
pub use source::{SourceMelDataset, SourceMelDatasetOptions};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Indexed, lazily loaded collection of utterance items.
pub trait Dataset {
    type Item;

    /// Number of aligned utterance records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Utterance ids in index order, whether or not items carry them.
    fn utt_ids(&self) -> &[String];

    /// Load (or fetch from cache) the item at `index`.
    fn get(&self, index: usize) -> Result<Arc<Self::Item>>;

    /// Iterate items in index order.
    fn iter(&self) -> DatasetIter<'_, Self>
    where
        Self: Sized,
    {
        DatasetIter {
            dataset: self,
            next: 0,
        }
    }
}

/// Iterator over a dataset in index order.
pub struct DatasetIter<'a, D> {
    dataset: &'a D,
    next: usize,
}

impl<D: Dataset> Iterator for DatasetIter<'_, D> {
    type Item = Result<Arc<D::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

/// Id bookkeeping and cache policy shared by the dataset variants.
#[derive(Debug)]
pub(crate) struct Records<T> {
    utt_ids: Arc<[String]>,
    return_utt_id: bool,
    cache: Option<ItemCache<T>>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            utt_ids: Arc::clone(&self.utt_ids),
            return_utt_id: self.return_utt_id,
            cache: self.cache.clone(),
        }
    }
}

impl<T> Records<T> {
    pub(crate) fn new(utt_ids: Vec<String>, return_utt_id: bool, allow_cache: bool) -> Self {
        let cache = allow_cache.then(|| ItemCache::new(utt_ids.len()));
        Self {
            utt_ids: utt_ids.into(),
            return_utt_id,
            cache,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.utt_ids.len()
    }

    pub(crate) fn utt_ids(&self) -> &[String] {
        &self.utt_ids
    }

    /// Cache lookup-or-populate around `load`, which receives the id to embed.
    pub(crate) fn fetch(
        &self,
        index: usize,
        load: impl FnOnce(Option<String>) -> Result<T>,
    ) -> Result<Arc<T>> {
        if index >= self.len() {
            return Err(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let utt_id = self.return_utt_id.then(|| self.utt_ids[index].clone());
        match &self.cache {
            Some(cache) => cache.get_or_load(index, || load(utt_id)),
            None => Ok(Arc::new(load(utt_id)?)),
        }
    }
}

/// Run a loader and attach the path to any failure.
pub(crate) fn load_item<A>(loader: &dyn FeatLoader<A>, path: &Path) -> Result<A> {
    loader.load(path).map_err(|source| DatasetError::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Fail with [`DatasetError::EmptyCorpus`] when nothing was found.
pub(crate) fn ensure_non_empty(
    files: &[PathBuf],
    modality: &'static str,
    root: &Path,
) -> Result<()> {
    if files.is_empty() {
        return Err(DatasetError::EmptyCorpus {
            modality,
            root: root.to_path_buf(),
        });
    }
    Ok(())
}
