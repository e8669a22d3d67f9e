//! Sample-domain preprocessing applied before analysis

/// Apply pre-emphasis filter `y[i] = x[i] - a * x[i - 1]` (boosts high frequencies)
pub fn pre_emphasis(samples: &[f32], coefficient: f32) -> Vec<f32> {
    if samples.is_empty() {
        return vec![];
    }

    let mut output = Vec::with_capacity(samples.len());
    output.push(samples[0]);

    for i in 1..samples.len() {
        output.push(samples[i] - coefficient * samples[i - 1]);
    }

    output
}

/// Mix interleaved multi-channel audio down to mono
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Extend with silence up to `len` samples; longer input is left unchanged
pub fn zero_pad(samples: &mut Vec<f32>, len: usize) {
    if samples.len() < len {
        samples.resize(len, 0.0);
    }
}

/// Keep at most `max_seconds` of audio
pub fn truncate_seconds(samples: &mut Vec<f32>, sample_rate: u32, max_seconds: Option<u32>) {
    if let Some(seconds) = max_seconds.filter(|&s| s > 0) {
        samples.truncate(seconds as usize * sample_rate as usize);
    }
}
