//! Error taxonomy for corpus discovery and item loading.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::PathBuf;

/// Result alias for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Corpus integrity and load failures raised by the dataset layer.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// No file survived discovery and filtering.
    #[error("Not found any {modality} files in {}.", .root.display())]
    EmptyCorpus {
        /// Modality label (audio, mel, ...).
        modality: &'static str,
        /// Root that produced no files.
        root: PathBuf,
    },

    /// Two modalities of one corpus disagree on the number of files.
    #[error("Number of {left_label} and {right_label} files are different ({left} vs {right}).")]
    CountMismatch {
        left_label: &'static str,
        left: usize,
        right_label: &'static str,
        right: usize,
    },

    /// Source and target roots of a parallel corpus hold different utterances.
    #[error(
        "Utterance ids differ between source ({src_count}) and target ({trg_count}): \
         only in source {}, only in target {}",
        format_ids(.only_src),
        format_ids(.only_trg)
    )]
    UttIdMismatch {
        src_count: usize,
        trg_count: usize,
        only_src: BTreeSet<String>,
        only_trg: BTreeSet<String>,
    },

    /// The same utterance id was derived from two files of one side.
    #[error("Duplicate utterance id {utt_id:?} under {}.", .root.display())]
    DuplicateUttId { utt_id: String, root: PathBuf },

    /// The file query is not a valid glob pattern.
    #[error("Invalid file query {query:?}: {message}")]
    InvalidQuery { query: String, message: String },

    /// `get` was called past the end of the dataset.
    #[error("Index {index} is out of range for dataset of length {len}.")]
    IndexOutOfRange { index: usize, len: usize },

    /// Walking the corpus root failed.
    #[error("Failed to scan {}: {source}", .root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The injected load function failed for one item.
    #[error("Failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

fn format_ids(ids: &BTreeSet<String>) -> String {
    let mut out = String::from("{");
    for (idx, id) in ids.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        let _ = write!(&mut out, "{id:?}");
    }
    out.push('}');
    out
}
