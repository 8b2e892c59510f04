// SPDX-License-Identifier: GPL-3.0-or-later
pub mod matcher;
pub mod repositories;
pub mod sqlite_adapters;

pub use repositories::FingerprintStore;
pub use sqlite_adapters::SqliteFingerprintStore;

use anyhow::Result;
use bgmprint_config::StoreConfig;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use tracing::info;

/// Open the fingerprint store described by `config`, creating the database
/// file and applying migrations when needed. The caller owns the returned
/// handle and must `close` it.
pub async fn open_store(config: &StoreConfig) -> Result<SqliteFingerprintStore> {
    info!(target: "store", "opening fingerprint store");

    let db_url = normalize_db_url(&config.url)?;
    info!(target: "store", db_url = %db_url, "connecting to database");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool_max_size.max(1))
        .connect(&db_url)
        .await?;

    info!(target: "store", db_url = %config.url, "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "store", "fingerprint store ready");
    Ok(SqliteFingerprintStore::new(pool, config))
}

/// Make a file-backed SQLite URL absolute, create its parent directory and
/// ask SQLite to create the file. Other URLs pass through unchanged.
fn normalize_db_url(url: &str) -> Result<String> {
    if !url.starts_with("sqlite://") || url.starts_with("sqlite://:memory:") {
        return Ok(url.to_string());
    }

    let db_path = url.trim_start_matches("sqlite://");
    let path = Path::new(db_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            info!(target: "store", path = %parent.display(), "created database directory");
        }
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    // Forward slashes work for SQLite on every platform.
    let path_str = absolute_path.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", path_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgmprint_domain::{TrackIdentity, TrackRecord};
    use bgmprint_fingerprint::Fingerprint;

    #[test]
    fn memory_url_is_untouched() {
        assert_eq!(normalize_db_url("sqlite::memory:").unwrap(), "sqlite::memory:");
        assert_eq!(
            normalize_db_url("sqlite://:memory:").unwrap(),
            "sqlite://:memory:"
        );
    }

    #[test]
    fn file_url_becomes_absolute_with_create_mode() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("fingerprints.db");
        let url = format!("sqlite://{}", db.display());

        let normalized = normalize_db_url(&url).unwrap();
        assert!(normalized.ends_with("fingerprints.db?mode=rwc"));
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn open_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            url: format!("sqlite://{}", dir.path().join("db").join("fp.db").display()),
            ..StoreConfig::default()
        };

        let store = open_store(&config).await.expect("open store");
        let record = TrackRecord::new(TrackIdentity::new("dova-s", "keep"), "Song[keep]", 100, "…");
        store
            .insert(&record, &Fingerprint::new(vec![1, 2, 3, 4], 0.5))
            .await
            .expect("insert");
        store.close().await;

        let reopened = open_store(&config).await.expect("reopen store");
        let fetched = reopened.lookup(&record.identity).await.expect("lookup");
        assert_eq!(fetched, Some(record));
        reopened.close().await;
    }
}
