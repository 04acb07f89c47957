//! Shared fixtures: dumped corpora, checkpoints, statistics and configs
//! written into temporary directories.

#![allow(dead_code)]

use burn_ndarray::NdArray;
use melvc::container::{write_array2, write_tensors, TensorData};
use ndarray::{Array, Array1, Array2};
use ndarray_npy::WriteNpyExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub type TestBackend = NdArray<f32>;

/// Channels used by the fixture corpora.
pub const CHANNELS: usize = 4;

/// Deterministic `(frames, CHANNELS)` features; `seed` makes files distinguishable.
pub fn feats(frames: usize, seed: f32) -> Array2<f32> {
    Array::from_shape_fn((frames, CHANNELS), |(t, c)| seed + t as f32 * 0.1 + c as f32 * 0.01)
}

pub fn wave(samples: usize, seed: f32) -> Array1<f32> {
    Array::from_shape_fn(samples, |i| ((seed + i as f32) * 0.05).sin())
}

pub fn write_npy<D: ndarray::Dimension>(path: &Path, array: &Array<f32, D>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    array
        .write_npy(File::create(path).expect("create npy"))
        .expect("write npy");
}

/// `<root>/<id>-feats.npy` for every `(id, frames)`.
pub fn write_npy_corpus(root: &Path, utts: &[(&str, usize)]) -> Vec<Array2<f32>> {
    utts.iter()
        .enumerate()
        .map(|(i, (id, frames))| {
            let array = feats(*frames, i as f32);
            write_npy(&root.join(format!("{id}-feats.npy")), &array);
            array
        })
        .collect()
}

/// `<root>/<id>.safetensors` holding a `feats` field.
pub fn write_safetensors_corpus(root: &Path, utts: &[(&str, usize)]) -> Vec<Array2<f32>> {
    fs::create_dir_all(root).expect("create dir");
    utts.iter()
        .enumerate()
        .map(|(i, (id, frames))| {
            let array = feats(*frames, i as f32);
            write_array2(root.join(format!("{id}.safetensors")), "feats", &array)
                .expect("write container");
            array
        })
        .collect()
}

/// Identity-like `FramewiseLinear` checkpoint plus `config.yml` beside it.
///
/// `extra_yaml` is appended to the config verbatim.
pub fn write_model(dir: &Path, extra_yaml: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create dir");
    let checkpoint = dir.join("checkpoint-100steps.safetensors");
    let mut weight = vec![0.0_f32; CHANNELS * CHANNELS];
    for c in 0..CHANNELS {
        weight[c * CHANNELS + c] = 2.0;
    }
    let weight = TensorData::new(vec![CHANNELS, CHANNELS], weight);
    let bias = TensorData::new(vec![CHANNELS], vec![0.5; CHANNELS]);
    let step = TensorData::new(vec![1], vec![100.0]);
    write_tensors(
        &checkpoint,
        [
            ("model.weight", &weight),
            ("model.bias", &bias),
            ("optimizer.step", &step),
        ],
    )
    .expect("write checkpoint");

    let config = format!(
        "model_type: FramewiseLinear\nmodel_params:\n  idim: {CHANNELS}\n  odim: {CHANNELS}\ninference:\n  threshold: 0.5\n  maxlenratio: 5.0\n{extra_yaml}"
    );
    fs::write(dir.join("config.yml"), config).expect("write config");
    checkpoint
}

/// Zero-mean, unit-scale statistics.
pub fn write_stats(path: &Path) {
    let mean = TensorData::new(vec![CHANNELS], vec![0.0; CHANNELS]);
    let scale = TensorData::new(vec![CHANNELS], vec![1.0; CHANNELS]);
    write_tensors(path, [("mean", &mean), ("scale", &scale)]).expect("write stats");
}

/// `FrameProjection` vocoder with `hop_size` samples per frame. Returns the
/// YAML `vocoder:` section pointing at it.
pub fn write_vocoder(dir: &Path, hop_size: usize, sampling_rate: u32) -> String {
    fs::create_dir_all(dir).expect("create dir");
    let checkpoint = dir.join("checkpoint-400000steps.safetensors");
    let weight = TensorData::new(
        vec![hop_size, CHANNELS],
        (0..hop_size * CHANNELS).map(|i| (i % 3) as f32 * 0.1).collect(),
    );
    write_tensors(&checkpoint, [("generator.weight", &weight)]).expect("write vocoder");
    fs::write(
        dir.join("config.yml"),
        format!(
            "generator_type: FrameProjection\nsampling_rate: {sampling_rate}\nhop_size: {hop_size}\n"
        ),
    )
    .expect("write vocoder config");
    let stats = dir.join("stats.safetensors");
    write_stats(&stats);
    format!(
        "vocoder:\n  checkpoint: {}\n  stats: {}\n",
        checkpoint.display(),
        stats.display()
    )
}

/// Sorted list of file names directly under `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
