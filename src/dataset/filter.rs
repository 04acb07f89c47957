//! Length threshold filtering shared by every dataset variant.

use super::error::Result;
use super::load_item;
use super::loader::{leading_len, FeatLoader};
use ndarray::{Array, Dimension};
use std::path::PathBuf;

/// Indices of `files` whose leading-axis length is strictly above `threshold`.
///
/// Every candidate is fully loaded to measure it. `None` keeps everything.
pub fn retained_indices<D: Dimension>(
    files: &[PathBuf],
    loader: &dyn FeatLoader<Array<f32, D>>,
    threshold: Option<usize>,
    label: &str,
) -> Result<Vec<usize>> {
    let Some(threshold) = threshold else {
        return Ok((0..files.len()).collect());
    };
    let mut keep = Vec::with_capacity(files.len());
    for (idx, path) in files.iter().enumerate() {
        let array = load_item(loader, path)?;
        if leading_len(&array) > threshold {
            keep.push(idx);
        }
    }
    if keep.len() != files.len() {
        log::warn!(
            "Some files are filtered by {label} length threshold ({} -> {}).",
            files.len(),
            keep.len()
        );
    }
    Ok(keep)
}

/// Keep only `indices` of `items`, in order.
pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&idx| items[idx].clone()).collect()
}

/// Filter `primary` by length and apply the same selection to `others`.
pub fn filter_jointly<D: Dimension>(
    primary: &mut Vec<PathBuf>,
    others: &mut [&mut Vec<PathBuf>],
    loader: &dyn FeatLoader<Array<f32, D>>,
    threshold: Option<usize>,
    label: &str,
) -> Result<()> {
    if threshold.is_none() {
        return Ok(());
    }
    let keep = retained_indices(primary, loader, threshold, label)?;
    *primary = select(primary, &keep);
    for other in others.iter_mut() {
        **other = select(other, &keep);
    }
    Ok(())
}
