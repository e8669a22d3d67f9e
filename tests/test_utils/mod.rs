// tests/test_utils/mod.rs
//
// Shared helpers: seeded synthetic music, WAV writers and engine setup.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use findsimilar::config::{ConfigBuilder, ConfigPreset, EngineConfig};
use findsimilar::core::dsp::Matrix;
use findsimilar::core::DecodedAudio;

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Notes on a random scale with a little noise, so spectra change over time.
///
/// Content stays below 4 kHz, which keeps it intact through a 16 kHz resample.
pub fn music_like(seed: u64, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let mut rng = seeded_rng(seed);
    let len = (sample_rate as f32 * seconds) as usize;
    let note_len = (sample_rate as f32 * 0.25) as usize;

    let mut samples = vec![0.0f32; len];
    let mut start = 0;
    while start < len {
        let voices: Vec<(f32, f32)> = (0..3)
            .map(|_| (rng.random_range(110.0..1800.0), rng.random_range(0.05..0.2)))
            .collect();
        let end = (start + note_len).min(len);
        for (i, sample) in samples[start..end].iter_mut().enumerate() {
            let t = (start + i) as f32 / sample_rate as f32;
            let decay = (-(i as f32) / note_len as f32 * 3.0).exp();
            *sample = voices
                .iter()
                .map(|&(freq, amp)| {
                    amp * decay * ((2.0 * PI * freq * t).sin() + 0.3 * (2.0 * PI * 2.0 * freq * t).sin())
                })
                .sum();
        }
        start = end;
    }
    for sample in samples.iter_mut() {
        *sample += rng.random_range(-0.005..0.005);
    }
    samples
}

pub fn decoded(samples: Vec<f32>, sample_rate: u32) -> DecodedAudio {
    let duration_ms = samples.len() as u64 * 1000 / sample_rate as u64;
    DecodedAudio {
        samples,
        sample_rate,
        duration_ms,
        tags: BTreeMap::new(),
    }
}

/// 16-bit mono WAV
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Preset configuration with query fingerprints cut on the indexing grid
pub fn aligned_config(preset: ConfigPreset) -> EngineConfig {
    ConfigBuilder::from_preset(preset)
        .query_stride(None)
        .seconds_to_analyze(30)
        .build()
        .unwrap()
}

/// Features with `dim` rows and `frames` columns from a seeded RNG
pub fn random_features(seed: u64, dim: usize, frames: usize) -> Matrix {
    let mut rng = seeded_rng(seed);
    let data = (0..dim * frames).map(|_| rng.random_range(-1.0..1.0)).collect();
    Matrix::from_vec(dim, frames, data).unwrap()
}
