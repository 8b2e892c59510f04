// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FingerprintError>;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio decoding error: {0}")]
    Decode(String),

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}
