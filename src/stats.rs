//! Feature normalization statistics.
//!
//! Models are trained on features normalized as `(x - mean) / scale`. Decoded
//! output is mapped back with [`FeatStats::denormalize`], and vocoders that
//! were trained on their own statistics renormalize with their own file.

use crate::container;
use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Axis};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Per-channel mean and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatStats {
    pub mean: Array1<f32>,
    pub scale: Array1<f32>,
}

impl FeatStats {
    pub fn new(mean: Array1<f32>, scale: Array1<f32>) -> Result<Self> {
        if mean.len() != scale.len() {
            anyhow::bail!(
                "Stats dimension mismatch: mean has {} channels, scale has {}",
                mean.len(),
                scale.len()
            );
        }
        Ok(Self { mean, scale })
    }

    /// Load statistics from a container with `mean` and `scale` fields, or
    /// from a `.npy` array of shape `(2, channels)` holding mean then scale.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_npy = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("npy"));
        if is_npy {
            let reader = BufReader::new(
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
            );
            let stacked = Array2::<f32>::read_npy(reader)?;
            if stacked.nrows() != 2 {
                anyhow::bail!(
                    "Expected stats of shape (2, C) in {}, got {:?}",
                    path.display(),
                    stacked.shape()
                );
            }
            return Self::new(
                stacked.index_axis(Axis(0), 0).to_owned(),
                stacked.index_axis(Axis(0), 1).to_owned(),
            );
        }
        Self::new(
            container::read_array1(path, "mean")?,
            container::read_array1(path, "scale")?,
        )
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    fn check(&self, feats: &Array2<f32>) -> Result<()> {
        if feats.ncols() != self.dim() {
            anyhow::bail!(
                "Feature dimension {} does not match stats dimension {}",
                feats.ncols(),
                self.dim()
            );
        }
        Ok(())
    }

    /// `x * scale + mean`, row by row.
    pub fn denormalize(&self, feats: &Array2<f32>) -> Result<Array2<f32>> {
        self.check(feats)?;
        Ok(feats * &self.scale + &self.mean)
    }

    /// `(x - mean) / scale`, row by row.
    pub fn normalize(&self, feats: &Array2<f32>) -> Result<Array2<f32>> {
        self.check(feats)?;
        Ok((feats - &self.mean) / &self.scale)
    }
}
