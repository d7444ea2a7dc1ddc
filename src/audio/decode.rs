//! Container decoding for browser-encoded audio.
//!
//! Browsers hand us compressed, containerized streams (WebM, Ogg, MP4, or
//! plain WAV from a file upload). Symphonia probes and decodes them; we only
//! collect interleaved f32 samples and the stream parameters. Conditioning
//! to 16 kHz mono happens in [`crate::audio::resample`].

use crate::error::{Result, ScribedError};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio prior to conditioning.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples, normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() / self.channels;
        frames as u64 * 1000 / self.sample_rate as u64
    }

    /// Keep only the trailing `ms` milliseconds.
    pub fn truncate_to_tail(&mut self, ms: u32) {
        if self.sample_rate == 0 || self.channels == 0 {
            return;
        }
        let keep_frames = (self.sample_rate as u64 * ms as u64 / 1000) as usize;
        let keep_samples = keep_frames * self.channels;
        if self.samples.len() > keep_samples {
            self.samples.drain(..self.samples.len() - keep_samples);
        }
    }
}

/// Decode a complete in-memory container to interleaved f32 samples.
///
/// The format is probed from content; an optional `extension` hint speeds up
/// the probe for file uploads. Trailing truncated packets (normal for a
/// snapshot of a live stream) are tolerated: decoding stops at the first
/// hard error after at least some audio was produced.
pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ScribedError::AudioDecode {
            message: format!("unrecognized container: {}", e),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ScribedError::AudioDecode {
            message: "no supported audio track".to_string(),
        })?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ScribedError::AudioDecode {
            message: format!("unsupported codec: {}", e),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(_) if !samples.is_empty() => {
                // Live snapshots routinely end mid-packet
                break;
            }
            Err(e) => {
                return Err(ScribedError::AudioDecode {
                    message: format!("demux failed: {}", e),
                });
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(_) if !samples.is_empty() => break,
            Err(e) => {
                return Err(ScribedError::AudioDecode {
                    message: format!("decode failed: {}", e),
                });
            }
        }
    }

    if samples.is_empty() {
        return Err(ScribedError::AudioDecode {
            message: "stream contained no decodable audio".to_string(),
        });
    }
    if sample_rate == 0 || channels == 0 {
        return Err(ScribedError::AudioDecode {
            message: "stream did not declare rate/channels".to_string(),
        });
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
