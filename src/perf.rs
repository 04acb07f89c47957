//! Per-stage timing and counters for decode runs.
//!
//! Stages record into process-wide atomics, so spans can be opened from any
//! thread without coordination. `melvc decode --perf` prints the report once
//! every utterance has been written.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Stages and quantities tracked during a decode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Metric {
    ConfigLoad,
    DatasetBuild,
    DatasetLoad,
    ModelRestore,
    VocoderRestore,
    ModelInference,
    VocoderDecode,
    PlotWrite,
    FeatsWrite,
    WavWrite,
    Utterances,
    InputFrames,
    OutputFrames,
    WaveSamples,
}

impl Metric {
    const COUNT: usize = 14;

    const ALL: [Metric; Metric::COUNT] = [
        Metric::ConfigLoad,
        Metric::DatasetBuild,
        Metric::DatasetLoad,
        Metric::ModelRestore,
        Metric::VocoderRestore,
        Metric::ModelInference,
        Metric::VocoderDecode,
        Metric::PlotWrite,
        Metric::FeatsWrite,
        Metric::WavWrite,
        Metric::Utterances,
        Metric::InputFrames,
        Metric::OutputFrames,
        Metric::WaveSamples,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Dotted name shown in the report.
    pub fn name(self) -> &'static str {
        match self {
            Metric::ConfigLoad => "config.load",
            Metric::DatasetBuild => "dataset.build",
            Metric::DatasetLoad => "dataset.load",
            Metric::ModelRestore => "model.restore",
            Metric::VocoderRestore => "vocoder.restore",
            Metric::ModelInference => "model.inference",
            Metric::VocoderDecode => "vocoder.decode",
            Metric::PlotWrite => "output.plot",
            Metric::FeatsWrite => "output.feats",
            Metric::WavWrite => "output.wav",
            Metric::Utterances => "decode.utterances",
            Metric::InputFrames => "decode.input_frames",
            Metric::OutputFrames => "decode.output_frames",
            Metric::WaveSamples => "decode.wave_samples",
        }
    }

    fn is_counter(self) -> bool {
        matches!(
            self,
            Metric::Utterances | Metric::InputFrames | Metric::OutputFrames | Metric::WaveSamples
        )
    }
}

struct PerfCollector {
    start: Instant,
    totals_us: [AtomicU64; Metric::COUNT],
    counts: [AtomicU64; Metric::COUNT],
}

impl PerfCollector {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            totals_us: std::array::from_fn(|_| AtomicU64::new(0)),
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn add_duration(&self, metric: Metric, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.totals_us[metric.index()].fetch_add(micros, Ordering::Relaxed);
        self.counts[metric.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn add_count(&self, metric: Metric, delta: u64) {
        self.counts[metric.index()].fetch_add(delta, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PerfSnapshot {
        PerfSnapshot {
            uptime: self.start.elapsed(),
            totals_us: std::array::from_fn(|i| self.totals_us[i].load(Ordering::Relaxed)),
            counts: std::array::from_fn(|i| self.counts[i].load(Ordering::Relaxed)),
        }
    }
}

static COLLECTOR: OnceLock<PerfCollector> = OnceLock::new();

fn collector() -> &'static PerfCollector {
    COLLECTOR.get_or_init(PerfCollector::new)
}

/// Records its lifetime under `metric` when dropped.
pub struct PerfSpan {
    metric: Metric,
    start: Instant,
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        collector().add_duration(self.metric, self.start.elapsed());
    }
}

pub fn span(metric: Metric) -> PerfSpan {
    PerfSpan {
        metric,
        start: Instant::now(),
    }
}

pub fn add_count(metric: Metric, delta: u64) {
    collector().add_count(metric, delta);
}

/// Current value of a counter metric, or the number of recorded spans.
pub fn count(metric: Metric) -> u64 {
    collector().counts[metric.index()].load(Ordering::Relaxed)
}

#[derive(Debug)]
pub struct PerfSnapshot {
    uptime: Duration,
    totals_us: [u64; Metric::COUNT],
    counts: [u64; Metric::COUNT],
}

impl PerfSnapshot {
    /// Stage table sorted by total time, then counters.
    pub fn format(&self) -> String {
        let mut stages: Vec<(Metric, u64, u64)> = Vec::new();
        let mut counters: Vec<(Metric, u64)> = Vec::new();
        for metric in Metric::ALL {
            let total_us = self.totals_us[metric.index()];
            let count = self.counts[metric.index()];
            if metric.is_counter() {
                if count > 0 {
                    counters.push((metric, count));
                }
            } else if count > 0 || total_us > 0 {
                stages.push((metric, total_us, count));
            }
        }
        stages.sort_by(|a, b| b.1.cmp(&a.1));

        let mut output = String::new();
        let _ = writeln!(
            &mut output,
            "Decode timings (uptime: {:.3}s)",
            self.uptime.as_secs_f64()
        );
        if stages.is_empty() && counters.is_empty() {
            let _ = writeln!(&mut output, "Nothing recorded.");
            return output;
        }

        if !stages.is_empty() {
            let _ = writeln!(
                &mut output,
                "  {:<24} {:>10} {:>8} {:>10}",
                "stage", "total", "calls", "avg"
            );
            for (metric, total_us, count) in stages {
                let avg_ms = if count == 0 {
                    0.0
                } else {
                    total_us as f64 / count as f64 / 1000.0
                };
                let _ = writeln!(
                    &mut output,
                    "  {:<24} {:>9.3}s {:>8} {:>8.3}ms",
                    metric.name(),
                    total_us as f64 / 1_000_000.0,
                    count,
                    avg_ms
                );
            }
        }
        for (metric, value) in counters {
            let _ = writeln!(&mut output, "  {:<24} {}", metric.name(), value);
        }
        output
    }
}

/// Report of everything recorded so far in this process.
pub fn report() -> String {
    collector().snapshot().format()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_table_covers_every_variant() {
        for (index, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), index);
        }
    }

    #[test]
    fn spans_and_counters_show_up_in_report() {
        {
            let _span = span(Metric::PlotWrite);
        }
        add_count(Metric::WaveSamples, 480);
        let report = report();
        assert!(report.contains("output.plot"));
        assert!(report.contains("decode.wave_samples"));
        assert!(count(Metric::WaveSamples) >= 480);
    }
}
