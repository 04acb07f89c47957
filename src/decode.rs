//! Batch decoding of a dumped evaluation set.
//!
//! A decode run restores a conversion model from a checkpoint, converts
//! every source utterance found under the dump directory and writes, per
//! utterance, three diagnostic plots, the converted features and (with a
//! vocoder configured) a waveform:
//!
//! ```text
//! <outdir>/outs/<id>.png
//! <outdir>/probs/<id>_prob.png
//! <outdir>/att_ws/<id>_att_ws.png
//! <outdir>/<trg_feat_type>/<id>.safetensors
//! <outdir>/wav/<id>.wav
//! ```

use crate::audio::io::WavIo;
use crate::config::{self, DecodeConfig};
use crate::container;
use crate::dataset::{
    Dataset, NpyLoader, SafetensorsLoader, SharedLoader, SourceMelDataset,
    SourceMelDatasetOptions, UttIdNaming,
};
use crate::download::{fetch_artifact, fetch_sibling};
use crate::model::{ModelRegistry, VcModel};
use crate::perf::{self, Metric};
use crate::plot;
use crate::stats::FeatStats;
use crate::tensor::{array2_to_tensor, tensor_to_array1, tensor_to_array2, tensor_to_array3};
use crate::vocoder::{build_vocoder, GeneratorRegistry, Vocoder};
use crate::weights::load_model_state_dict;
use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where source features come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Directory of per-utterance feature files.
    Dumpdir(PathBuf),
    /// Kaldi-style `feats.scp` list. Accepted on the command line, not
    /// readable yet.
    FeatsScp(PathBuf),
}

impl InputSource {
    /// Exactly one of the two flags must be given.
    pub fn from_flags(feats_scp: Option<PathBuf>, dumpdir: Option<PathBuf>) -> Result<Self> {
        match (feats_scp, dumpdir) {
            (None, Some(dumpdir)) => Ok(Self::Dumpdir(dumpdir)),
            (Some(feats_scp), None) => Ok(Self::FeatsScp(feats_scp)),
            _ => anyhow::bail!("Please specify either --dumpdir or --feats-scp."),
        }
    }
}

/// On-disk layout of the dumped source features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum FeatFormat {
    /// `<id>.safetensors`, one named field per feature type.
    #[default]
    Safetensors,
    /// `<id>-feats.npy` flat arrays.
    Npy,
}

impl FeatFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safetensors => "safetensors",
            Self::Npy => "npy",
        }
    }

    /// File query matching one utterance.
    pub fn query(self) -> &'static str {
        match self {
            Self::Safetensors => "*.safetensors",
            Self::Npy => "*-feats.npy",
        }
    }

    /// Loader for `feat_type` features; flat arrays hold a single type.
    pub fn loader(self, feat_type: &str) -> SharedLoader<Array2<f32>> {
        match self {
            Self::Safetensors => Arc::new(SafetensorsLoader::new(feat_type)),
            Self::Npy => Arc::new(NpyLoader),
        }
    }

    pub fn naming(self) -> UttIdNaming {
        match self {
            Self::Safetensors => UttIdNaming::Stem,
            Self::Npy => UttIdNaming::flat_feats(),
        }
    }

    /// Dataset options reading `feat_type` features in this layout.
    pub fn source_options(self, feat_type: &str) -> SourceMelDatasetOptions {
        SourceMelDatasetOptions {
            mel_query: self.query().to_string(),
            mel_loader: self.loader(feat_type),
            naming: self.naming(),
            ..Default::default()
        }
    }
}

/// Command-line inputs of a decode run.
#[derive(Debug, Clone)]
pub struct DecodeArgs {
    pub feats_scp: Option<PathBuf>,
    pub dumpdir: Option<PathBuf>,
    pub trg_stats: PathBuf,
    pub outdir: PathBuf,
    pub checkpoint: PathBuf,
    /// Defaults to `config.yml` beside the checkpoint.
    pub config: Option<PathBuf>,
    pub src_feat_type: String,
    pub trg_feat_type: String,
    pub src_format: FeatFormat,
    pub verbose: u8,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl DecodeArgs {
    /// Arguments reading `dumpdir` with every optional flag at its default.
    pub fn new(
        dumpdir: impl Into<PathBuf>,
        checkpoint: impl Into<PathBuf>,
        trg_stats: impl Into<PathBuf>,
        outdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            feats_scp: None,
            dumpdir: Some(dumpdir.into()),
            trg_stats: trg_stats.into(),
            outdir: outdir.into(),
            checkpoint: checkpoint.into(),
            config: None,
            src_feat_type: "feats".to_string(),
            trg_feat_type: "feats".to_string(),
            src_format: FeatFormat::default(),
            verbose: 1,
            progress: false,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| config::default_config_path(&self.checkpoint))
    }

    /// Local copies of the checkpoint, its configuration and the target
    /// statistics. `hf://` and `http(s)://` locations are downloaded into the
    /// cache; without `--config` the configuration is the checkpoint's
    /// `config.yml` sibling, fetched from the same place.
    pub fn resolve_artifacts(&self) -> Result<ResolvedArtifacts> {
        let checkpoint_location = self.checkpoint.to_string_lossy();
        let checkpoint = fetch_artifact(&checkpoint_location)
            .with_context(|| format!("Checkpoint not found: {checkpoint_location}"))?;
        let config = match &self.config {
            Some(location) => fetch_artifact(&location.to_string_lossy()),
            None => fetch_sibling(&checkpoint_location, config::DEFAULT_CONFIG_NAME),
        }
        .with_context(|| format!("Config file not found: {}", self.config_path().display()))?;
        let trg_stats = fetch_artifact(&self.trg_stats.to_string_lossy())
            .with_context(|| format!("Stats file not found: {}", self.trg_stats.display()))?;
        Ok(ResolvedArtifacts {
            checkpoint,
            config,
            trg_stats,
        })
    }

    /// Every argument as a configuration entry, merged over the YAML file.
    pub fn overrides(&self) -> Vec<(&'static str, Value)> {
        fn path(value: &Path) -> Value {
            Value::String(value.to_string_lossy().into_owned())
        }
        fn optional(value: &Option<PathBuf>) -> Value {
            value.as_deref().map_or(Value::Null, path)
        }
        vec![
            ("feats_scp", optional(&self.feats_scp)),
            ("dumpdir", optional(&self.dumpdir)),
            ("trg_stats", path(&self.trg_stats)),
            ("outdir", path(&self.outdir)),
            ("checkpoint", path(&self.checkpoint)),
            ("config", path(&self.config_path())),
            ("src_feat_type", Value::String(self.src_feat_type.clone())),
            ("trg_feat_type", Value::String(self.trg_feat_type.clone())),
            ("src_format", Value::String(self.src_format.as_str().to_string())),
            ("verbose", Value::Number(self.verbose.into())),
        ]
    }
}

/// Local paths behind the checkpoint, config and stats arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifacts {
    pub checkpoint: PathBuf,
    pub config: PathBuf,
    pub trg_stats: PathBuf,
}

/// Output locations for one run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    outdir: PathBuf,
    feat_type: String,
}

impl OutputLayout {
    pub fn new(outdir: impl Into<PathBuf>, feat_type: impl Into<String>) -> Self {
        Self {
            outdir: outdir.into(),
            feat_type: feat_type.into(),
        }
    }

    pub fn outs_plot(&self, utt_id: &str) -> PathBuf {
        self.outdir.join("outs").join(format!("{utt_id}.png"))
    }

    pub fn probs_plot(&self, utt_id: &str) -> PathBuf {
        self.outdir.join("probs").join(format!("{utt_id}_prob.png"))
    }

    pub fn att_ws_plot(&self, utt_id: &str) -> PathBuf {
        self.outdir.join("att_ws").join(format!("{utt_id}_att_ws.png"))
    }

    pub fn feats(&self, utt_id: &str) -> PathBuf {
        self.outdir
            .join(&self.feat_type)
            .join(format!("{utt_id}.safetensors"))
    }

    pub fn wav(&self, utt_id: &str) -> PathBuf {
        self.outdir.join("wav").join(format!("{utt_id}.wav"))
    }
}

/// Counts reported after a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub utterances: usize,
    pub output_frames: usize,
    pub waveforms: usize,
}

/// Everything restored before the first utterance is converted.
pub struct DecodeSession<B: Backend> {
    args: DecodeArgs,
    config: DecodeConfig,
    dataset: SourceMelDataset,
    model: Box<dyn VcModel<B>>,
    vocoder: Option<Box<dyn Vocoder<B>>>,
    layout: OutputLayout,
    device: B::Device,
}

impl<B: Backend> DecodeSession<B> {
    /// Validate arguments, resolve configuration and restore model and vocoder.
    ///
    /// # Errors
    ///
    /// Flag errors are reported before any file is touched. Afterwards any
    /// unreadable config, stats file, dataset or checkpoint aborts.
    pub fn prepare(
        args: DecodeArgs,
        models: &ModelRegistry<B>,
        generators: &GeneratorRegistry<B>,
        device: &B::Device,
    ) -> Result<Self> {
        let dumpdir = match InputSource::from_flags(args.feats_scp.clone(), args.dumpdir.clone())? {
            InputSource::Dumpdir(dumpdir) => dumpdir,
            InputSource::FeatsScp(_) => {
                anyhow::bail!("Reading features from --feats-scp is not implemented; use --dumpdir.")
            }
        };

        fs::create_dir_all(&args.outdir)
            .with_context(|| format!("Failed to create {}", args.outdir.display()))?;

        let artifacts = args.resolve_artifacts()?;
        let config = {
            let _span = perf::span(Metric::ConfigLoad);
            let mut document = config::load_document(&artifacts.config)?;
            config::merge_overrides(&mut document, args.overrides());
            for line in config::describe(&document) {
                log::info!("{line}");
            }
            DecodeConfig::from_mapping(document)?
        };
        let trg_stats = FeatStats::load(&artifacts.trg_stats)?;

        let dataset = {
            let _span = perf::span(Metric::DatasetBuild);
            let options = SourceMelDatasetOptions {
                return_utt_id: true,
                ..args.src_format.source_options(&args.src_feat_type)
            };
            SourceMelDataset::new(&dumpdir, options)?
        };
        log::info!("The number of features to be decoded = {}.", dataset.len());

        let model = {
            let _span = perf::span(Metric::ModelRestore);
            let state = load_model_state_dict(&artifacts.checkpoint)?;
            log::debug!("Checkpoint tensors: {:?}", state.names().collect::<Vec<_>>());
            models.build(&config.model_type, &config.model_params, &state, device)?
        };
        log::info!("Loaded model parameters from {}.", args.checkpoint.display());

        let vocoder = match &config.vocoder {
            Some(section) => Some(build_vocoder(section, trg_stats, generators, device)?),
            None => None,
        };

        let layout = OutputLayout::new(&args.outdir, &args.trg_feat_type);
        Ok(Self {
            args,
            config,
            dataset,
            model,
            vocoder,
            layout,
            device: device.clone(),
        })
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn dataset(&self) -> &SourceMelDataset {
        &self.dataset
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn has_vocoder(&self) -> bool {
        self.vocoder.is_some()
    }

    /// Convert every utterance in order, stopping between utterances once
    /// `interrupted` is set.
    pub fn run(&self, interrupted: &AtomicBool) -> Result<DecodeSummary> {
        let progress = if self.args.progress {
            let bar = ProgressBar::new(self.dataset.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[decode] {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta_precise}]")?,
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut summary = DecodeSummary::default();
        for index in 0..self.dataset.len() {
            if interrupted.load(Ordering::SeqCst) {
                progress.abandon();
                anyhow::bail!("Interrupted after {} utterances", summary.utterances);
            }
            let frames = self.decode_one(index, &mut summary)?;
            progress.set_message(format!("{frames} frames"));
            progress.inc(1);
        }
        progress.finish();
        Ok(summary)
    }

    fn decode_one(&self, index: usize, summary: &mut DecodeSummary) -> Result<usize> {
        let item = {
            let _span = perf::span(Metric::DatasetLoad);
            self.dataset.get(index)?
        };
        let utt_id = item
            .utt_id
            .clone()
            .unwrap_or_else(|| self.dataset.utt_ids()[index].clone());
        perf::add_count(Metric::InputFrames, item.mel.nrows() as u64);

        let start = Instant::now();
        let output = {
            let _span = perf::span(Metric::ModelInference);
            let feats = array2_to_tensor::<B>(&item.mel, &self.device);
            self.model.inference(feats, &self.config.inference)?
        };
        let outs = tensor_to_array2(output.outs.clone())?;
        let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);
        log::info!(
            "inference speed = {:.1} frames / sec.",
            outs.nrows() as f64 / elapsed
        );

        {
            let _span = perf::span(Metric::PlotWrite);
            plot::plot_feats(&outs, self.layout.outs_plot(&utt_id), true)?;
            plot::plot_curve(
                &tensor_to_array1(output.probs)?,
                self.layout.probs_plot(&utt_id),
            )?;
            plot::plot_attention(
                &tensor_to_array3(output.att_ws)?,
                self.layout.att_ws_plot(&utt_id),
            )?;
        }

        {
            let _span = perf::span(Metric::FeatsWrite);
            let path = self.layout.feats(&utt_id);
            create_parent(&path)?;
            container::write_array2(&path, &self.args.trg_feat_type, &outs)?;
        }

        if let Some(vocoder) = &self.vocoder {
            let (samples, sample_rate) = vocoder.decode(output.outs)?;
            let _span = perf::span(Metric::WavWrite);
            let path = self.layout.wav(&utt_id);
            create_parent(&path)?;
            WavIo::write_pcm16(&path, &samples, sample_rate)?;
            summary.waveforms += 1;
        }

        perf::add_count(Metric::Utterances, 1);
        perf::add_count(Metric::OutputFrames, outs.nrows() as u64);
        summary.utterances += 1;
        summary.output_frames += outs.nrows();
        log::debug!("Decoded {utt_id} ({} frames)", outs.nrows());
        Ok(outs.nrows())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Prepare and run a decode with the built-in model and generator registries.
pub fn decode<B: Backend>(
    args: DecodeArgs,
    device: &B::Device,
    interrupted: &AtomicBool,
) -> Result<DecodeSummary> {
    let session = DecodeSession::<B>::prepare(
        args,
        &ModelRegistry::default(),
        &GeneratorRegistry::default(),
        device,
    )?;
    session.run(interrupted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_input_flag() {
        let both = InputSource::from_flags(Some("feats.scp".into()), Some("dump".into()));
        let neither = InputSource::from_flags(None, None);
        for result in [both, neither] {
            assert_eq!(
                result.unwrap_err().to_string(),
                "Please specify either --dumpdir or --feats-scp."
            );
        }
        assert_eq!(
            InputSource::from_flags(None, Some("dump".into())).expect("dumpdir"),
            InputSource::Dumpdir("dump".into())
        );
    }

    #[test]
    fn flag_errors_come_before_any_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outdir = dir.path().join("never-created");
        let mut args = DecodeArgs::new("dump", "missing/checkpoint.safetensors", "stats", &outdir);
        args.feats_scp = Some("feats.scp".into());
        let err = decode::<burn_ndarray::NdArray<f32>>(
            args,
            &Default::default(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("either --dumpdir or --feats-scp"));
        assert!(!outdir.exists());
    }

    #[test]
    fn scp_input_is_not_implemented() {
        let mut args = DecodeArgs::new("dump", "ckpt", "stats", "out");
        args.dumpdir = None;
        args.feats_scp = Some("feats.scp".into());
        let err = decode::<burn_ndarray::NdArray<f32>>(
            args,
            &Default::default(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn overrides_carry_every_argument() {
        let args = DecodeArgs::new("dump/eval", "exp/ckpt.safetensors", "dump/stats.npy", "out");
        let overrides = args.overrides();
        let get = |key: &str| {
            overrides
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(get("feats_scp"), Some(Value::Null));
        assert_eq!(get("config"), Some(Value::String("exp/config.yml".into())));
        assert_eq!(get("src_format"), Some(Value::String("safetensors".into())));
        assert_eq!(get("verbose"), Some(Value::Number(1.into())));
    }

    #[test]
    fn local_artifacts_resolve_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checkpoint = dir.path().join("checkpoint-100steps.safetensors");
        let stats = dir.path().join("stats.safetensors");
        for path in [&checkpoint, &stats, &dir.path().join("config.yml")] {
            fs::write(path, b"").expect("write");
        }

        let args = DecodeArgs::new("dump", &checkpoint, &stats, "out");
        let resolved = args.resolve_artifacts().expect("resolve");
        assert_eq!(resolved.checkpoint, checkpoint);
        assert_eq!(resolved.config, dir.path().join("config.yml"));
        assert_eq!(resolved.trg_stats, stats);

        let explicit = dir.path().join("decode.yml");
        fs::write(&explicit, b"").expect("write");
        let mut args = DecodeArgs::new("dump", &checkpoint, &stats, "out");
        args.config = Some(explicit.clone());
        assert_eq!(args.resolve_artifacts().expect("resolve").config, explicit);
    }

    #[test]
    fn missing_sibling_config_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checkpoint = dir.path().join("checkpoint-100steps.safetensors");
        let stats = dir.path().join("stats.safetensors");
        fs::write(&checkpoint, b"").expect("write");
        fs::write(&stats, b"").expect("write");

        let err = DecodeArgs::new("dump", &checkpoint, &stats, "out")
            .resolve_artifacts()
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
        assert!(err.to_string().contains("config.yml"));
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("out", "mel");
        assert_eq!(layout.outs_plot("u1"), PathBuf::from("out/outs/u1.png"));
        assert_eq!(layout.probs_plot("u1"), PathBuf::from("out/probs/u1_prob.png"));
        assert_eq!(layout.att_ws_plot("u1"), PathBuf::from("out/att_ws/u1_att_ws.png"));
        assert_eq!(layout.feats("u1"), PathBuf::from("out/mel/u1.safetensors"));
        assert_eq!(layout.wav("u1"), PathBuf::from("out/wav/u1.wav"));
    }
}
