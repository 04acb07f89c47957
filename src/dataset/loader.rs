//! Format-agnostic item loading.
//!
//! Datasets never look at the bytes on disk themselves. They hold a
//! [`FeatLoader`] per modality and call it with a path.

use crate::container;
use crate::audio::io::WavIo;
use anyhow::Result;
use ndarray::{Array, Array1, Array2, Dimension};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Anything that turns a path into an in-memory array.
pub trait FeatLoader<A>: Send + Sync {
    fn load(&self, path: &Path) -> Result<A>;
}

impl<A, F> FeatLoader<A> for F
where
    F: Fn(&Path) -> Result<A> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<A> {
        self(path)
    }
}

/// Shared handle to a loader, cloned into every dataset handle.
pub type SharedLoader<A> = Arc<dyn FeatLoader<A>>;

/// Leading-axis length of a loaded array (frames for features, samples for audio).
pub fn leading_len<D: Dimension>(array: &Array<f32, D>) -> usize {
    array.shape().first().copied().unwrap_or(0)
}

/// Reads a flat `.npy` array.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpyLoader;

impl<D: Dimension> FeatLoader<Array<f32, D>> for NpyLoader {
    fn load(&self, path: &Path) -> Result<Array<f32, D>> {
        let reader = BufReader::new(File::open(path)?);
        let array = Array::<f32, D>::read_npy(reader)?;
        Ok(array)
    }
}

/// Reads one named field of a safetensors container.
#[derive(Debug, Clone)]
pub struct SafetensorsLoader {
    key: String,
}

impl SafetensorsLoader {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FeatLoader<Array2<f32>> for SafetensorsLoader {
    fn load(&self, path: &Path) -> Result<Array2<f32>> {
        container::read_array2(path, &self.key)
    }
}

impl FeatLoader<Array1<f32>> for SafetensorsLoader {
    fn load(&self, path: &Path) -> Result<Array1<f32>> {
        container::read_array1(path, &self.key)
    }
}

/// Reads a WAV file as mono samples; extra channels are averaged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavLoader;

impl FeatLoader<Array1<f32>> for WavLoader {
    fn load(&self, path: &Path) -> Result<Array1<f32>> {
        let (channels, _sample_rate) = WavIo::read_wav(path)?;
        Ok(Array1::from(WavIo::downmix(&channels)))
    }
}
