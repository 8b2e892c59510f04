// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use bgmprint_domain::{MatchResult, TrackIdentity, TrackRecord};
use bgmprint_fingerprint::Fingerprint;

// ============================================================================
// Store Traits
// ============================================================================

/// Persistent index of tracks and their fingerprints.
#[async_trait::async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn lookup(&self, identity: &TrackIdentity) -> Result<Option<TrackRecord>>;

    /// Insert a record with its fingerprint. Either both become visible or neither does.
    async fn insert(&self, record: &TrackRecord, fingerprint: &Fingerprint) -> Result<()>;

    /// Candidates for `fingerprint`, best confidence first.
    async fn search(&self, fingerprint: &Fingerprint) -> Result<Vec<MatchResult>>;

    async fn track_ids(&self) -> Result<Vec<TrackIdentity>>;

    async fn delete(&self, identity: &TrackIdentity) -> Result<()>;

    /// Remove every track; returns how many were deleted.
    async fn delete_all(&self) -> Result<u64>;

    /// Remember that `query` matched `result`.
    async fn register_match(&self, query: &str, result: &MatchResult) -> Result<()>;
}
