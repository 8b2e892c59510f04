// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub pool_max_size: u32,
    /// Highest number of differing bits for two aligned sub-fingerprints to count as a match.
    pub max_bit_error: u32,
    /// Minimum number of alignment-key hits a track needs before it is scored.
    pub min_alignment_votes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://db/fingerprints.db".to_string(),
            pool_max_size: 4,
            max_bit_error: 10,
            min_alignment_votes: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub display_name_max_len: usize,
    pub truncation_marker: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            display_name_max_len: 100,
            truncation_marker: "…".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub min_confidence: f64,
    pub register_matches: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            register_matches: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
    pub telemetry: TelemetryConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: BGMPRINT_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("BGMPRINT_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(target: "config", store = %config.store.url, "configuration loaded");
    Ok(config)
}
