// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{Context, Result};
use bgmprint_config::StoreConfig;
use bgmprint_domain::{MatchResult, TrackIdentity, TrackRecord};
use bgmprint_fingerprint::Fingerprint;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::matcher::{alignment_key, query_keys, score_alignment, OffsetVotes};
use crate::repositories::FingerprintStore;

/// Keys per `IN (...)` lookup; stays under SQLite's bound-parameter limit.
const KEY_LOOKUP_CHUNK: usize = 500;

/// SQLx-backed fingerprint store.
pub struct SqliteFingerprintStore {
    pool: SqlitePool,
    max_bit_error: u32,
    min_alignment_votes: usize,
}

impl SqliteFingerprintStore {
    pub fn new(pool: SqlitePool, config: &StoreConfig) -> Self {
        Self {
            pool,
            max_bit_error: config.max_bit_error,
            min_alignment_votes: config.min_alignment_votes.max(1),
        }
    }

    /// Release the connection pool. Consumes the store so it cannot be used afterwards.
    pub async fn close(self) {
        info!(target: "store", "closing fingerprint store");
        self.pool.close().await;
    }

    async fn load_track(&self, track_id: &str) -> Result<Option<Fingerprint>> {
        let row = sqlx::query("SELECT duration_secs, sub_fingerprints FROM tracks WHERE id = ?")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| -> Result<Fingerprint> {
            let duration: f64 = r.try_get("duration_secs")?;
            let blob: Vec<u8> = r.try_get("sub_fingerprints")?;
            Fingerprint::from_blob(&blob, duration as f32)
                .with_context(|| format!("corrupt fingerprint for {}", track_id))
        })
        .transpose()
    }

    async fn collect_votes(&self, query: &[u32]) -> Result<OffsetVotes> {
        let keys = query_keys(query);
        let distinct: Vec<u32> = keys.keys().copied().collect();
        let mut votes = OffsetVotes::new();

        for chunk in distinct.chunks(KEY_LOOKUP_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT track_id, position, key FROM alignment_keys WHERE key IN (");
            let mut separated = qb.separated(", ");
            for key in chunk {
                separated.push_bind(*key as i64);
            }
            separated.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for r in rows {
                let track_id: String = r.try_get("track_id")?;
                let track_pos: i64 = r.try_get("position")?;
                let key: i64 = r.try_get("key")?;
                if let Some(positions) = keys.get(&(key as u32)) {
                    for query_pos in positions {
                        votes.record(&track_id, track_pos as usize, *query_pos);
                    }
                }
            }
        }
        Ok(votes)
    }
}

#[async_trait::async_trait]
impl FingerprintStore for SqliteFingerprintStore {
    async fn lookup(&self, identity: &TrackIdentity) -> Result<Option<TrackRecord>> {
        debug!(target: "store", %identity, "looking up track");
        let row = sqlx::query("SELECT id, title, metadata FROM tracks WHERE id = ? LIMIT 1")
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    async fn insert(&self, record: &TrackRecord, fingerprint: &Fingerprint) -> Result<()> {
        debug!(
            target: "store",
            identity = %record.identity,
            items = fingerprint.len(),
            "inserting track"
        );
        fingerprint.validate()?;

        let mut tx = self.pool.begin().await?;

        let q = r#"
            INSERT INTO tracks (
                id, title, metadata, duration_secs, item_count, sub_fingerprints, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;
        sqlx::query(q)
            .bind(record.identity.as_str())
            .bind(&record.display_name)
            .bind(&record.metadata)
            .bind(fingerprint.duration_secs as f64)
            .bind(fingerprint.len() as i64)
            .bind(fingerprint.to_blob())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for (position, item) in fingerprint.sub_fingerprints.iter().enumerate() {
            sqlx::query("INSERT INTO alignment_keys (track_id, position, key) VALUES (?, ?, ?)")
                .bind(record.identity.as_str())
                .bind(position as i64)
                .bind(alignment_key(*item) as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, fingerprint: &Fingerprint) -> Result<Vec<MatchResult>> {
        debug!(target: "store", items = fingerprint.len(), "searching fingerprint");
        let query = &fingerprint.sub_fingerprints;
        if query.is_empty() {
            return Ok(vec![]);
        }

        let votes = self.collect_votes(query).await?;
        if votes.is_empty() {
            return Ok(vec![]);
        }

        let mut results = Vec::new();
        for (track_id, offset, count) in votes.best_offsets(self.min_alignment_votes) {
            let Some(track) = self.load_track(&track_id).await? else {
                continue;
            };
            let Some(alignment) =
                score_alignment(query, &track.sub_fingerprints, offset, self.max_bit_error)
            else {
                continue;
            };
            debug!(
                target: "store",
                %track_id,
                offset,
                votes = count,
                confidence = alignment.confidence(),
                "scored candidate"
            );
            results.push(MatchResult {
                matched_identity: TrackIdentity::from_stored(track_id),
                confidence: alignment.confidence(),
                query_coverage: alignment.query_coverage(query.len()),
                track_coverage: alignment.track_coverage(track.len()),
                query_match_start_secs: alignment.query_start_secs(),
                track_match_start_secs: alignment.track_start_secs(),
            });
        }

        results.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.matched_identity.cmp(&b.matched_identity))
        });
        Ok(results)
    }

    async fn track_ids(&self) -> Result<Vec<TrackIdentity>> {
        let rows = sqlx::query("SELECT id FROM tracks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let id: String = r.try_get("id")?;
            out.push(TrackIdentity::from_stored(id));
        }
        Ok(out)
    }

    async fn delete(&self, identity: &TrackIdentity) -> Result<()> {
        debug!(target: "store", %identity, "deleting track");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM alignment_keys WHERE track_id = ?")
            .bind(identity.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(identity.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM alignment_keys")
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM tracks")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        info!(target: "store", deleted, "deleted all tracks");
        Ok(deleted)
    }

    async fn register_match(&self, query: &str, result: &MatchResult) -> Result<()> {
        debug!(target: "store", identity = %result.matched_identity, query, "registering match");
        let q = r#"
            INSERT INTO match_registrations (
                track_id, query_path, confidence, query_coverage, registered_at
            ) VALUES (?, ?, ?, ?, ?)
        "#;
        sqlx::query(q)
            .bind(result.matched_identity.as_str())
            .bind(query)
            .bind(result.confidence)
            .bind(result.query_coverage)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TrackRecord> {
    let id: String = row.try_get("id")?;
    let display_name: String = row.try_get("title")?;
    let metadata: String = row.try_get("metadata")?;
    Ok(TrackRecord {
        identity: TrackIdentity::from_stored(id),
        display_name,
        metadata,
    })
}

// ============================================================================
// Tests
// ============================================================================
