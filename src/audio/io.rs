//! WAV reading and 16-bit PCM writing.

use anyhow::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

#[derive(Debug, Default)]
pub struct WavIo;

impl WavIo {
    /// Read a WAV file into per-channel `f32` samples in `[-1, 1]`.
    pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<Vec<f32>>, u32)> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let sample_rate = spec.sample_rate;
        let mut samples = vec![Vec::new(); channels];

        match spec.sample_format {
            SampleFormat::Float => {
                for (idx, sample) in reader.samples::<f32>().enumerate() {
                    samples[idx % channels].push(sample?);
                }
            }
            SampleFormat::Int => {
                let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                for (idx, sample) in reader.samples::<i32>().enumerate() {
                    samples[idx % channels].push(sample? as f32 / max);
                }
            }
        }

        Ok((samples, sample_rate))
    }

    /// Average channels into a single mono track.
    pub fn downmix(channels: &[Vec<f32>]) -> Vec<f32> {
        match channels {
            [] => Vec::new(),
            [mono] => mono.clone(),
            _ => {
                let len = channels.iter().map(Vec::len).min().unwrap_or(0);
                let scale = 1.0 / channels.len() as f32;
                (0..len)
                    .map(|t| channels.iter().map(|c| c[t]).sum::<f32>() * scale)
                    .collect()
            }
        }
    }

    /// Write mono samples as 16-bit PCM. Values outside `[-1, 1]` are clipped.
    pub fn write_pcm16(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            anyhow::bail!("Sample rate must be > 0");
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for value in samples {
            let value = value.clamp(-1.0, 1.0);
            let scaled = (value * i16::MAX as f32).round() as i16;
            writer.write_sample(scaled)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::WavIo;
    use tempfile::tempdir;

    #[test]
    fn pcm16_is_clipped_and_readable() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("u1.wav");
        WavIo::write_pcm16(&path, &[0.0, 0.5, -2.0, 1.5], 22050).expect("write wav");

        let reader = hound::WavReader::open(&path).expect("open");
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().channels, 1);

        let (decoded, sample_rate) = WavIo::read_wav(&path).expect("read wav");
        assert_eq!(sample_rate, 22050);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].len(), 4);
        assert!((decoded[0][1] - 0.5).abs() < 1e-3);
        assert!(decoded[0][2] <= -0.99);
        assert!(decoded[0][3] >= 0.99);
    }

    #[test]
    fn downmix_averages_channels() {
        let mixed = WavIo::downmix(&[vec![1.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(mixed, vec![0.5, 0.0]);
    }
}
