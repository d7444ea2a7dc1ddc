//! Channel downmix and sample-rate conversion.
//!
//! The model wants 16 kHz mono i16; browsers and SDK tracks deliver whatever
//! they like. Linear interpolation is sufficient for speech — the model is
//! far more tolerant of resampling artifacts than of latency.

use crate::defaults;

/// Downmix interleaved multi-channel samples to mono by averaging.
///
/// A trailing partial frame (fewer samples than `channels`) is dropped.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resample of mono samples from `from_rate` to `to_rate`.
pub fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || mono.is_empty() {
        return mono.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((mono.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = mono[idx];
        let b = if idx + 1 < mono.len() { mono[idx + 1] } else { a };
        out.push(a + (b - a) * frac);
    }
    out
}

/// Convert normalized f32 samples to 16-bit PCM, clamping out-of-range input.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Convert 16-bit PCM to normalized f32 samples.
pub fn to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Full conditioning pipeline: interleaved f32 at any rate/layout to
/// 16 kHz mono i16 ready for inference.
pub fn prepare_for_inference(interleaved: &[f32], channels: usize, sample_rate: u32) -> Vec<i16> {
    let mono = downmix(interleaved, channels);
    let resampled = resample(&mono, sample_rate, defaults::SAMPLE_RATE);
    to_i16(&resampled)
}
