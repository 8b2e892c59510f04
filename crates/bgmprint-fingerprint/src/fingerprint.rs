// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// Time step covered by one sub-fingerprint (default Chromaprint preset:
/// 1365-sample hop at 11025 Hz).
pub const ITEM_DURATION_SECS: f64 = 1365.0 / 11025.0;

/// Audio fingerprint (Chromaprint).
///
/// A sequence of 32-bit sub-fingerprints, one per analysis step. Two
/// recordings of the same audio produce sequences whose aligned items differ
/// in only a few bits, which is what the store's search relies on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fingerprint {
    pub sub_fingerprints: Vec<u32>,
    /// Duration of the decoded audio (in seconds).
    pub duration_secs: f32,
    /// Chromaprint algorithm id (1 is the default preset).
    #[serde(default = "default_algorithm")]
    pub algorithm: u32,
}

fn default_algorithm() -> u32 {
    1
}

impl Fingerprint {
    pub fn new(sub_fingerprints: Vec<u32>, duration_secs: f32) -> Self {
        Self {
            sub_fingerprints,
            duration_secs,
            algorithm: default_algorithm(),
        }
    }

    pub fn len(&self) -> usize {
        self.sub_fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_fingerprints.is_empty()
    }

    /// Offset in seconds of the item at `index`.
    pub fn item_offset_secs(index: usize) -> f64 {
        index as f64 * ITEM_DURATION_SECS
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.sub_fingerprints.is_empty() {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "fingerprint has no sub-fingerprints".to_string(),
            ));
        }

        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(crate::FingerprintError::InvalidFingerprint(
                "duration must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Little-endian byte encoding used for storage.
    pub fn to_blob(&self) -> Vec<u8> {
        self.sub_fingerprints
            .iter()
            .flat_map(|item| item.to_le_bytes())
            .collect()
    }

    pub fn from_blob(blob: &[u8], duration_secs: f32) -> crate::Result<Self> {
        if blob.len() % 4 != 0 {
            return Err(crate::FingerprintError::InvalidFingerprint(format!(
                "blob length {} is not a multiple of 4",
                blob.len()
            )));
        }

        let sub_fingerprints = blob
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self::new(sub_fingerprints, duration_secs))
    }
}
