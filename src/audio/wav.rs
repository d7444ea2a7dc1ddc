//! WAV parsing helpers.
//!
//! The one-shot transcription path accepts WAV directly through hound, which
//! is cheaper and stricter than the general container probe.

use crate::error::{Result, ScribedError};
use std::io::Read;

/// A parsed WAV payload.
#[derive(Debug, Clone)]
pub struct WavAudio {
    /// Interleaved 16-bit PCM samples.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl WavAudio {
    /// Condition to 16 kHz mono i16 for inference.
    pub fn into_inference_samples(self) -> Vec<i16> {
        let f32_samples = crate::audio::resample::to_f32(&self.samples);
        crate::audio::resample::prepare_for_inference(
            &f32_samples,
            self.channels as usize,
            self.sample_rate,
        )
    }
}

/// Parse WAV data from a reader.
///
/// Float and 8/24/32-bit integer WAVs are converted to 16-bit.
pub fn read_wav<R: Read>(reader: R) -> Result<WavAudio> {
    let mut wav = hound::WavReader::new(reader).map_err(|e| ScribedError::AudioDecode {
        message: format!("invalid WAV: {}", e),
    })?;
    let spec = wav.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16);
            wav.samples::<i32>()
                .map(|s| {
                    s.map(|v| (v >> shift) as i16)
                        .map_err(|e| ScribedError::AudioDecode {
                            message: format!("WAV sample read failed: {}", e),
                        })
                })
                .collect::<Result<Vec<i16>>>()?
        }
        hound::SampleFormat::Float => wav
            .samples::<f32>()
            .map(|s| {
                s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i16)
                    .map_err(|e| ScribedError::AudioDecode {
                        message: format!("WAV sample read failed: {}", e),
                    })
            })
            .collect::<Result<Vec<i16>>>()?,
    };

    Ok(WavAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// True when the payload starts with a RIFF/WAVE header.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_fixture(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn reads_16bit_mono() {
        let samples = vec![0i16, 100, -100, 32767, -32768];
        let bytes = wav_fixture(&samples, 16000, 1);

        let audio = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(audio.samples, samples);
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.channels, 1);
    }

    #[test]
    fn rejects_non_wav_data() {
        assert!(read_wav(Cursor::new(b"not a wav".to_vec())).is_err());
    }

    #[test]
    fn into_inference_samples_resamples_stereo_48k() {
        let samples = vec![1000i16; 9600]; // 0.1s stereo at 48 kHz
        let bytes = wav_fixture(&samples, 48000, 2);

        let audio = read_wav(Cursor::new(bytes)).unwrap();
        let conditioned = audio.into_inference_samples();
        assert_eq!(conditioned.len(), 1600); // 0.1s mono at 16 kHz
    }

    #[test]
    fn looks_like_wav_detects_header() {
        let bytes = wav_fixture(&[0i16; 10], 16000, 1);
        assert!(looks_like_wav(&bytes));
        assert!(!looks_like_wav(b"\x1aE\xdf\xa3 webm header"));
        assert!(!looks_like_wav(b"RIFF"));
    }
}
