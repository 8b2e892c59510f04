// SPDX-License-Identifier: GPL-3.0-or-later
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Namespace every track identity lives in. Fixed so that a file keeps the
/// same identity across runs.
pub const IDENTITY_NAMESPACE: &str = "dova-s";

/// Canonical key of a track: `<namespace>/<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackIdentity(String);

impl TrackIdentity {
    pub fn new(namespace: &str, token: &str) -> Self {
        Self(format!("{}/{}", namespace, token))
    }

    /// Wrap an identity read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub identity: TrackIdentity,
    pub display_name: String,
    pub metadata: String,
}

impl TrackRecord {
    /// Build a record for a freshly ingested file. The display name is cut to
    /// `max_len` characters with `marker` appended when it is longer.
    pub fn new(
        identity: TrackIdentity,
        raw_file_name: &str,
        max_len: usize,
        marker: &str,
    ) -> Self {
        Self {
            identity,
            display_name: truncate_display_name(raw_file_name, max_len, marker),
            metadata: String::new(),
        }
    }
}

/// Truncate on character boundaries so multi-byte names never split a code point.
pub fn truncate_display_name(value: &str, max_len: usize, marker: &str) -> String {
    match value.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}{}", &value[..cut], marker),
        None => value.to_string(),
    }
}

// ============================================================================
// Query Results
// ============================================================================

/// One candidate returned by a fingerprint search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched_identity: TrackIdentity,
    /// Match strength in `[0, 1]`.
    pub confidence: f64,
    /// Fraction of the query spanned by the matched segment.
    pub query_coverage: f64,
    /// Fraction of the stored track spanned by the matched segment.
    pub track_coverage: f64,
    pub query_match_start_secs: f64,
    pub track_match_start_secs: f64,
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Found {} with coverage {:.2}, Query match starts at: {:.2}, Track match starts at: {:.2}",
            self.matched_identity,
            self.query_coverage,
            self.query_match_start_secs,
            self.track_match_start_secs
        )
    }
}

// ============================================================================
// Ingestion Reporting
// ============================================================================

/// A per-file failure recorded during the ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionError {
    pub raw_file_name: String,
    pub message: String,
}

impl IngestionError {
    pub fn new(raw_file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            raw_file_name: raw_file_name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IngestionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filename:{}, {}", self.raw_file_name, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub inserted_count: usize,
    pub skipped_count: usize,
    /// In the order the failures occurred.
    pub errors: Vec<IngestionError>,
    /// Set when the run stopped early on an interrupt.
    pub cancelled: bool,
}
