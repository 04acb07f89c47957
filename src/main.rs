//! Command-line interface for voice conversion decoding.
//!
//! `melvc decode` converts a dumped evaluation set with a trained model;
//! `melvc inspect` builds a dataset over one or two dump directories and lists
//! what it found, failing on integrity errors.

#![recursion_limit = "256"]

use anyhow::Result;
use burn::tensor::backend::Backend;
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::{Parser, Subcommand, ValueEnum};
use melvc::dataset::{
    Dataset, MelDataset, MelDatasetOptions, ParallelMelDataset, ParallelMelDatasetOptions,
};
use melvc::decode::{self, DecodeArgs, FeatFormat};
use melvc::perf;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "backend-wgpu")]
use burn_wgpu::graphics::AutoGraphicsApi;
#[cfg(feature = "backend-wgpu")]
use burn_wgpu::{init_setup, Wgpu, WgpuDevice};

/// Supported compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum BackendChoice {
    /// Use the WGPU backend (GPU acceleration when available).
    Wgpu,
    /// Use the ndarray backend (CPU).
    Ndarray,
}

#[cfg(feature = "backend-wgpu")]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Wgpu;
#[cfg(not(feature = "backend-wgpu"))]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Ndarray;

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "melvc")]
#[command(about = "Decode with trained voice conversion models", long_about = None)]
struct Cli {
    /// Logging level. Higher is more logging: 0 warn, 1 info, 2+ debug.
    #[arg(long, default_value_t = 1, global = true)]
    verbose: u8,
    /// Print a per-stage timing summary at the end of the run.
    #[arg(long, global = true)]
    perf: bool,
    /// Compute backend to use.
    #[arg(long, value_enum, default_value_t = DEFAULT_BACKEND, global = true)]
    backend: BackendChoice,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode with a trained VC model.
    Decode {
        /// Kaldi-style feats.scp file. Specify either this or --dumpdir.
        #[arg(long, visible_alias = "scp")]
        feats_scp: Option<PathBuf>,
        /// Directory including feature files. Specify either this or --feats-scp.
        #[arg(long)]
        dumpdir: Option<PathBuf>,
        /// Stats file for target denormalization.
        #[arg(long)]
        trg_stats: PathBuf,
        /// Directory to save generated features, figures and speech.
        #[arg(long)]
        outdir: PathBuf,
        /// Checkpoint file to be loaded.
        #[arg(long)]
        checkpoint: PathBuf,
        /// YAML configuration. Searched in the checkpoint directory if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Source feature type; the field read from each feature file.
        #[arg(long, default_value = "feats")]
        src_feat_type: String,
        /// Target feature type; the field and directory written per utterance.
        #[arg(long, default_value = "feats")]
        trg_feat_type: String,
        /// Layout of the dumped source features.
        #[arg(long, value_enum, default_value_t = FeatFormat::Safetensors)]
        src_format: FeatFormat,
        /// Hide the progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// List the utterances a dump directory (or a parallel pair) yields.
    Inspect {
        /// Source (or only) dump directory.
        #[arg(long)]
        dumpdir: PathBuf,
        /// Target dump directory; pairs utterances by id when given.
        #[arg(long)]
        trg_dumpdir: Option<PathBuf>,
        /// Layout of the dumped features.
        #[arg(long, value_enum, default_value_t = FeatFormat::Safetensors)]
        format: FeatFormat,
        /// Field read from each feature file.
        #[arg(long, default_value = "feats")]
        feat_type: String,
        /// Drop utterances with this many frames or fewer.
        #[arg(long)]
        threshold: Option<usize>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} ({}:{}) {}: {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("melvc"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .try_init();
    if verbose == 0 {
        log::warn!("Skip DEBUG/INFO messages");
    }
}

/// Entry point for the CLI.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            feats_scp,
            dumpdir,
            trg_stats,
            outdir,
            checkpoint,
            config,
            src_feat_type,
            trg_feat_type,
            src_format,
            no_progress,
        } => {
            let args = DecodeArgs {
                feats_scp,
                dumpdir,
                trg_stats,
                outdir,
                checkpoint,
                config,
                src_feat_type,
                trg_feat_type,
                src_format,
                verbose: cli.verbose,
                progress: !no_progress,
            };
            let interrupted = Arc::new(AtomicBool::new(false));
            let interrupt_flag = Arc::clone(&interrupted);
            ctrlc::set_handler(move || {
                interrupt_flag.store(true, Ordering::SeqCst);
            })?;
            match cli.backend {
                BackendChoice::Wgpu => {
                    #[cfg(feature = "backend-wgpu")]
                    {
                        let device = WgpuDevice::default();
                        init_setup::<AutoGraphicsApi>(&device, Default::default());
                        run_decode::<Wgpu>(args, &device, &interrupted)?;
                    }
                    #[cfg(not(feature = "backend-wgpu"))]
                    {
                        let _ = args;
                        anyhow::bail!("WGPU backend not enabled; build with --features backend-wgpu");
                    }
                }
                BackendChoice::Ndarray => {
                    let device = NdArrayDevice::default();
                    run_decode::<NdArray<f32>>(args, &device, &interrupted)?;
                }
            }
        }
        Commands::Inspect {
            dumpdir,
            trg_dumpdir,
            format,
            feat_type,
            threshold,
        } => run_inspect(dumpdir, trg_dumpdir, format, &feat_type, threshold)?,
    }

    if cli.perf {
        eprintln!("{}", perf::report());
    }

    Ok(())
}

fn run_decode<B: Backend>(
    args: DecodeArgs,
    device: &B::Device,
    interrupted: &AtomicBool,
) -> Result<()> {
    let summary = decode::decode::<B>(args, device, interrupted)?;
    log::info!(
        "Decoded {} utterances ({} frames, {} waveforms).",
        summary.utterances,
        summary.output_frames,
        summary.waveforms
    );
    Ok(())
}

fn run_inspect(
    dumpdir: PathBuf,
    trg_dumpdir: Option<PathBuf>,
    format: FeatFormat,
    feat_type: &str,
    threshold: Option<usize>,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match trg_dumpdir {
        Some(trg_dumpdir) => {
            let dataset = ParallelMelDataset::new(
                &dumpdir,
                &trg_dumpdir,
                ParallelMelDatasetOptions {
                    mel_query: format.query().to_string(),
                    src_loader: format.loader(feat_type),
                    trg_loader: format.loader(feat_type),
                    naming: format.naming(),
                    src_length_threshold: threshold,
                    trg_length_threshold: threshold,
                    ..Default::default()
                },
            )?;
            for (utt_id, item) in dataset.utt_ids().iter().zip(dataset.iter()) {
                let item = item?;
                writeln!(
                    out,
                    "{utt_id}\t{}\t{}",
                    item.src_mel.nrows(),
                    item.trg_mel.nrows()
                )?;
            }
            log::info!("{} parallel utterances.", dataset.len());
        }
        None => {
            let dataset = MelDataset::new(
                &dumpdir,
                MelDatasetOptions {
                    mel_query: format.query().to_string(),
                    mel_loader: format.loader(feat_type),
                    naming: format.naming(),
                    mel_length_threshold: threshold,
                    ..Default::default()
                },
            )?;
            for (utt_id, item) in dataset.utt_ids().iter().zip(dataset.iter()) {
                writeln!(out, "{utt_id}\t{}", item?.mel.nrows())?;
            }
            log::info!("{} utterances.", dataset.len());
        }
    }
    Ok(())
}
