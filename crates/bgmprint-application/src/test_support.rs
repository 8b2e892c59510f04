// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bgmprint_config::StoreConfig;
use bgmprint_fingerprint::{AudioDecoder, Fingerprint, FingerprintError, FingerprintingEngine};
use bgmprint_infrastructure::SqliteFingerprintStore;
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;

pub async fn memory_store() -> SqliteFingerprintStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");

    sqlx::migrate!("../../migrations").run(&pool).await.expect("migrate");
    SqliteFingerprintStore::new(pool, &StoreConfig::default())
}

/// Engine that derives a fingerprint from the file stem instead of decoding audio.
#[derive(Default)]
pub struct StubEngine {
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(stem: &str) -> Self {
        Self {
            fail_on: Some(stem.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FingerprintingEngine for StubEngine {
    async fn fingerprint(
        &self,
        path: &Path,
        _decoder: Arc<dyn AudioDecoder>,
    ) -> bgmprint_fingerprint::Result<Fingerprint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.as_deref() == Some(stem.as_str()) {
            return Err(FingerprintError::Decode(format!("stub failure for {}", stem)));
        }

        let mut state = stem.bytes().fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        let items = (0..64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect();
        Ok(Fingerprint::new(items, 8.0))
    }
}

/// Engine that takes `delay` before answering like [`StubEngine`].
pub struct SlowEngine {
    delay: Duration,
}

impl SlowEngine {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl FingerprintingEngine for SlowEngine {
    async fn fingerprint(
        &self,
        path: &Path,
        decoder: Arc<dyn AudioDecoder>,
    ) -> bgmprint_fingerprint::Result<Fingerprint> {
        tokio::time::sleep(self.delay).await;
        StubEngine::new().fingerprint(path, decoder).await
    }
}

/// Cancel `token` from another task after `delay`.
pub fn cancel_after(token: &CancellationToken, delay: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        token.cancel();
    });
}
