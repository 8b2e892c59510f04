// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio decoding to mono 16-bit PCM.
//!
//! The `AudioDecoder` trait is what the fingerprinting engine consumes; the
//! ingestion and query pipelines only hand it through. `SymphoniaDecoder`
//! covers FLAC, MP3, WAV/PCM and OGG Vorbis.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

use crate::{FingerprintError, Result};

/// Sample rate assumed when the container does not declare one.
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Audio samples: mono, 16-bit PCM at a given sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }
}

/// Turns an audio file into raw samples.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// Symphonia-backed decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    #[instrument(skip(self), fields(file = %path.display()))]
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        debug!(target: "fingerprint", "opening audio file for decoding");
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(&extension.to_lowercase());
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| FingerprintError::Decode(format!("Failed to probe stream: {}", e)))?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| FingerprintError::Decode("No audio tracks found".to_string()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| FingerprintError::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE);
        let mut samples: Vec<i16> = Vec::new();
        let mut buffer: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(FingerprintError::Decode(format!(
                        "Error reading packet: {}",
                        e
                    )))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(target: "fingerprint", error = msg, "skipping undecodable frame");
                    continue;
                }
                Err(e) => {
                    return Err(FingerprintError::Decode(format!(
                        "Failed to decode frame: {}",
                        e
                    )))
                }
            };

            let spec = *decoded.spec();
            if spec.rate > 0 {
                sample_rate = spec.rate;
            }
            let channels = spec.channels.count().max(1);

            let needed = decoded.capacity() * channels;
            if buffer.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                buffer = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }

            if let Some(buf) = buffer.as_mut() {
                buf.copy_interleaved_ref(decoded);

                for frame in buf.samples().chunks(channels) {
                    let mixed = frame.iter().sum::<f32>() / channels as f32;
                    let clipped = mixed.clamp(-1.0, 1.0);
                    samples.push((clipped * i16::MAX as f32) as i16);
                }
            }
        }

        if samples.is_empty() {
            return Err(FingerprintError::Decode(
                "No audio samples decoded".to_string(),
            ));
        }

        debug!(
            target: "fingerprint",
            sample_count = samples.len(),
            sample_rate,
            "decoded audio"
        );
        Ok(DecodedAudio::new(samples, sample_rate))
    }
}

/// Write a mono 16-bit PCM WAV file containing a sweep of tones.
#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, sample_rate: u32, seconds: u32) {
    use std::io::Write;

    let total = (sample_rate * seconds) as usize;
    let mut pcm = Vec::with_capacity(total * 2);
    for n in 0..total {
        let t = n as f32 / sample_rate as f32;
        // Change pitch every half second so the chroma features vary.
        let step = (t * 2.0) as u32 % 12;
        let freq = 220.0 * 2f32.powf(step as f32 / 12.0);
        let value = (t * freq * std::f32::consts::TAU).sin() * 0.6;
        pcm.extend_from_slice(&((value * i16::MAX as f32) as i16).to_le_bytes());
    }

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    out.extend_from_slice(&pcm);

    let mut file = File::create(path).expect("create wav");
    file.write_all(&out).expect("write wav");
}
