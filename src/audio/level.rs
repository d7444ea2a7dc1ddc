//! Loudness measurement for silence gating.
//!
//! Two gates exist because the two transports deliver different material:
//! decoded chunk audio is gated on RMS loudness in dBFS, raw SDK track PCM
//! on normalized peak amplitude.

/// Floor returned for digital silence, in dBFS.
pub const SILENCE_FLOOR_DBFS: f32 = -120.0;

/// Peak absolute amplitude of normalized samples (0.0 to 1.0).
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()))
}

/// Peak absolute amplitude of i16 PCM, normalized to 0.0..=1.0.
pub fn peak_i16(samples: &[i16]) -> f32 {
    let raw = samples.iter().fold(0_i32, |acc, &s| {
        acc.max((s as i32).saturating_abs())
    });
    raw as f32 / 32768.0
}

/// Root-mean-square level of normalized samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// RMS loudness in dBFS, floored at [`SILENCE_FLOOR_DBFS`].
pub fn dbfs(samples: &[f32]) -> f32 {
    let level = rms(samples);
    if level <= 0.0 {
        return SILENCE_FLOOR_DBFS;
    }
    (20.0 * level.log10()).max(SILENCE_FLOOR_DBFS)
}
