use super::{Vocoder, WaveGenerator};
use crate::perf::{self, Metric};
use crate::stats::FeatStats;
use crate::tensor::{array2_to_tensor, tensor_to_array2};
use anyhow::Result;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

fn run_generator<B: Backend>(
    generator: &dyn WaveGenerator<B>,
    feats: Tensor<B, 2>,
) -> Result<Vec<f32>> {
    let samples = generator.generate(feats)?;
    let samples = samples
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to read generated samples: {e:?}"))?;
    perf::add_count(Metric::WaveSamples, samples.len() as u64);
    Ok(samples)
}

/// Renormalizes model output into the generator's own feature space.
pub struct StatsVocoder<B: Backend> {
    generator: Box<dyn WaveGenerator<B>>,
    trg_stats: FeatStats,
    stats: FeatStats,
    sample_rate: u32,
}

impl<B: Backend> StatsVocoder<B> {
    pub fn new(
        generator: Box<dyn WaveGenerator<B>>,
        trg_stats: FeatStats,
        stats: FeatStats,
        sample_rate: u32,
    ) -> Self {
        Self {
            generator,
            trg_stats,
            stats,
            sample_rate,
        }
    }
}

impl<B: Backend> Vocoder<B> for StatsVocoder<B> {
    fn decode(&self, outs: Tensor<B, 2>) -> Result<(Vec<f32>, u32)> {
        let _span = perf::span(Metric::VocoderDecode);
        let device = outs.device();
        let raw = self.trg_stats.denormalize(&tensor_to_array2(outs)?)?;
        let feats = self.stats.normalize(&raw)?;
        let samples = run_generator(self.generator.as_ref(), array2_to_tensor(&feats, &device))?;
        Ok((samples, self.sample_rate))
    }
}

/// Hands denormalized features straight to an S3PRL-style generator.
pub struct S3prlFeat2Wav<B: Backend> {
    generator: Box<dyn WaveGenerator<B>>,
    trg_stats: FeatStats,
    sample_rate: u32,
}

impl<B: Backend> S3prlFeat2Wav<B> {
    pub fn new(generator: Box<dyn WaveGenerator<B>>, trg_stats: FeatStats, sample_rate: u32) -> Self {
        Self {
            generator,
            trg_stats,
            sample_rate,
        }
    }
}

impl<B: Backend> Vocoder<B> for S3prlFeat2Wav<B> {
    fn decode(&self, outs: Tensor<B, 2>) -> Result<(Vec<f32>, u32)> {
        let _span = perf::span(Metric::VocoderDecode);
        let device = outs.device();
        let raw = self.trg_stats.denormalize(&tensor_to_array2(outs)?)?;
        let samples = run_generator(self.generator.as_ref(), array2_to_tensor(&raw, &device))?;
        Ok((samples, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use ndarray::{array, Array2};
    use std::sync::{Arc, Mutex};

    type TestBackend = NdArray<f32>;

    /// Remembers its input and emits one zero sample per frame.
    struct Recording(Arc<Mutex<Option<Array2<f32>>>>);

    impl WaveGenerator<TestBackend> for Recording {
        fn generate(&self, feats: Tensor<TestBackend, 2>) -> Result<Tensor<TestBackend, 1>> {
            let frames = feats.dims()[0];
            let device = feats.device();
            *self.0.lock().expect("lock") = Some(tensor_to_array2(feats)?);
            Ok(Tensor::zeros([frames], &device))
        }
    }

    fn trg_stats() -> FeatStats {
        FeatStats::new(array![1.0, 2.0], array![2.0, 2.0]).expect("stats")
    }

    #[test]
    fn stats_vocoder_renormalizes() {
        let seen = Arc::new(Mutex::new(None));
        let vocoder_stats = FeatStats::new(array![1.0, 0.0], array![1.0, 4.0]).expect("stats");
        let vocoder = StatsVocoder::new(
            Box::new(Recording(seen.clone())),
            trg_stats(),
            vocoder_stats,
            24_000,
        );
        let device = NdArrayDevice::default();
        let outs = array2_to_tensor::<TestBackend>(&array![[1.0_f32, 1.0]], &device);
        let (samples, rate) = vocoder.decode(outs).expect("decode");

        assert_eq!((samples.len(), rate), (1, 24_000));
        // raw = [3, 4]; renormalized = [(3 - 1) / 1, (4 - 0) / 4]
        assert_eq!(seen.lock().expect("lock").clone(), Some(array![[2.0, 1.0]]));
    }

    #[test]
    fn s3prl_adapter_passes_raw_features() {
        let seen = Arc::new(Mutex::new(None));
        let vocoder = S3prlFeat2Wav::new(Box::new(Recording(seen.clone())), trg_stats(), 16_000);
        let device = NdArrayDevice::default();
        let outs = array2_to_tensor::<TestBackend>(&array![[1.0_f32, 1.0]], &device);
        vocoder.decode(outs).expect("decode");
        assert_eq!(seen.lock().expect("lock").clone(), Some(array![[3.0, 4.0]]));
    }
}
