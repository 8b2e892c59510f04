// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio fingerprint generation.
//!
//! The engine receives the decoder from its caller, decodes the file on a
//! blocking thread and feeds the mono samples through Chromaprint.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use bgmprint_fingerprint::{ChromaprintEngine, FingerprintingEngine, SymphoniaDecoder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ChromaprintEngine::new();
//! let fingerprint = engine
//!     .fingerprint(Path::new("song.flac"), Arc::new(SymphoniaDecoder::new()))
//!     .await?;
//! println!("{} sub-fingerprints", fingerprint.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use rusty_chromaprint::{Configuration, Fingerprinter};
use tracing::{debug, instrument};

use crate::{AudioDecoder, DecodedAudio, Fingerprint, FingerprintError, Result};

/// Computes a fingerprint for an audio file.
#[async_trait::async_trait]
pub trait FingerprintingEngine: Send + Sync {
    async fn fingerprint(
        &self,
        path: &Path,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Result<Fingerprint>;
}

/// Chromaprint fingerprint generator using the default preset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromaprintEngine;

impl ChromaprintEngine {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fingerprint from already decoded samples.
    pub fn fingerprint_samples(audio: &DecodedAudio) -> Result<Fingerprint> {
        if audio.samples.is_empty() {
            return Err(FingerprintError::AudioProcessing(
                "No audio samples available".to_string(),
            ));
        }

        debug!(
            target: "fingerprint",
            sample_count = audio.samples.len(),
            sample_rate = audio.sample_rate,
            "generating fingerprint from audio samples"
        );

        let config = Configuration::preset_test2();
        let mut printer = Fingerprinter::new(&config);
        printer.start(audio.sample_rate, 1).map_err(|e| {
            FingerprintError::AudioProcessing(format!("Failed to start Chromaprint: {:?}", e))
        })?;
        printer.consume(&audio.samples);
        printer.finish();

        let fingerprint = Fingerprint::new(printer.fingerprint().to_vec(), audio.duration_secs());
        if fingerprint.is_empty() {
            return Err(FingerprintError::AudioProcessing(
                "Chromaprint did not return a fingerprint (audio too short?)".to_string(),
            ));
        }
        Ok(fingerprint)
    }
}

#[async_trait::async_trait]
impl FingerprintingEngine for ChromaprintEngine {
    #[instrument(skip(self, decoder), fields(file = %path.display()))]
    async fn fingerprint(
        &self,
        path: &Path,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Result<Fingerprint> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let audio = decoder.decode(&path)?;
            Self::fingerprint_samples(&audio)
        })
        .await
        .map_err(|e| FingerprintError::AudioProcessing(format!("Fingerprint task failed: {}", e)))?
    }
}
