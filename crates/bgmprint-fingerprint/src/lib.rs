// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio decoding and Chromaprint fingerprint generation.
//!
//! This crate provides:
//! - The `AudioDecoder` capability and a symphonia-backed implementation
//! - The `FingerprintingEngine` capability and a Chromaprint implementation
//! - The `Fingerprint` value persisted by the store

pub mod decoder;
pub mod error;
pub mod fingerprint;
pub mod generator;

pub use decoder::{AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use error::{FingerprintError, Result};
pub use fingerprint::{Fingerprint, ITEM_DURATION_SECS};
pub use generator::{ChromaprintEngine, FingerprintingEngine};
