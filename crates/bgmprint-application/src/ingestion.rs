// SPDX-License-Identifier: GPL-3.0-or-later

//! Directory ingestion into the fingerprint store.
//!
//! A run has two passes over the directory listing:
//! 1. every file name is validated; a single invalid name aborts the run
//!    before anything is written
//! 2. each file is looked up, fingerprinted and inserted, one at a time;
//!    a failing file is recorded and the batch moves on
//!
//! Tracks already in the store are skipped, so re-running over the same
//! directory only picks up what is new or failed before.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bgmprint_config::IngestConfig;
use bgmprint_domain::{IngestionError, IngestionReport, TrackIdentity, TrackRecord};
use bgmprint_fingerprint::{AudioDecoder, FingerprintingEngine};
use bgmprint_infrastructure::FingerprintStore;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::{EventSink, IngestEvent, ItemOutcome, NoopEventSink};
use crate::identity::{IdentityResolver, ValidationFailure};

/// Reasons an ingestion run stops before the ingestion pass.
#[derive(Debug, Error)]
pub enum IngestionAbort {
    #[error("Cannot read directory {path}: {source}")]
    Listing {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{} file(s) do not follow the naming convention", .0.len())]
    InvalidFileNames(Vec<ValidationFailure>),
}

/// A regular file found in the ingested directory.
#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    raw_file_name: String,
}

pub struct IngestionPipeline<'a> {
    resolver: IdentityResolver,
    engine: Arc<dyn FingerprintingEngine>,
    decoder: Arc<dyn AudioDecoder>,
    store: &'a dyn FingerprintStore,
    settings: IngestConfig,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        resolver: IdentityResolver,
        engine: Arc<dyn FingerprintingEngine>,
        decoder: Arc<dyn AudioDecoder>,
        store: &'a dyn FingerprintStore,
        settings: &IngestConfig,
    ) -> Self {
        Self {
            resolver,
            engine,
            decoder,
            store,
            settings: settings.clone(),
            events: Arc::new(NoopEventSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ingest every regular file of `directory` in listing order.
    #[instrument(skip(self), fields(directory = %directory.display()))]
    pub async fn ingest(&self, directory: &Path) -> Result<IngestionReport, IngestionAbort> {
        let files = list_files(directory)?;
        let total = files.len();
        info!(target: "ingest", total, "validating file names");

        let mut resolved = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for file in files {
            match self.resolver.derive_identity(&file.raw_file_name) {
                Ok(identity) => resolved.push((file, identity)),
                Err(failure) => {
                    warn!(target: "ingest", name = %failure.raw_file_name, "invalid file name");
                    failures.push(failure);
                }
            }
        }
        if !failures.is_empty() {
            return Err(IngestionAbort::InvalidFileNames(failures));
        }

        let mut report = IngestionReport::default();
        for (i, (file, identity)) in resolved.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(target: "ingest", name = %file.raw_file_name, "interrupted, abandoning file");
                    report.cancelled = true;
                    break;
                }
                result = self.process_file(&file, identity) => result,
            };

            let outcome = match result {
                Ok(outcome) => {
                    match &outcome {
                        ItemOutcome::Inserted { .. } => report.inserted_count += 1,
                        ItemOutcome::Skipped { .. } => report.skipped_count += 1,
                        ItemOutcome::Failed { .. } => {}
                    }
                    outcome
                }
                Err(error) => {
                    warn!(
                        target: "ingest",
                        name = %error.raw_file_name,
                        error = %error.message,
                        "failed to ingest file"
                    );
                    report.errors.push(error);
                    ItemOutcome::Failed {
                        raw_file_name: file.raw_file_name.clone(),
                    }
                }
            };

            self.events.publish(&IngestEvent {
                index: i + 1,
                total,
                outcome,
            });
        }

        info!(
            target: "ingest",
            inserted = report.inserted_count,
            skipped = report.skipped_count,
            failed = report.errors.len(),
            cancelled = report.cancelled,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn process_file(
        &self,
        file: &SourceFile,
        identity: TrackIdentity,
    ) -> Result<ItemOutcome, IngestionError> {
        let raw = &file.raw_file_name;

        let existing = self
            .store
            .lookup(&identity)
            .await
            .map_err(|e| IngestionError::new(raw, format!("store lookup failed: {:#}", e)))?;
        if existing.is_some() {
            debug!(target: "ingest", %identity, "already in store");
            return Ok(ItemOutcome::Skipped { identity });
        }

        let fingerprint = self
            .engine
            .fingerprint(&file.path, self.decoder.clone())
            .await
            .map_err(|e| IngestionError::new(raw, e.to_string()))?;

        let record = TrackRecord::new(
            identity.clone(),
            raw,
            self.settings.display_name_max_len,
            &self.settings.truncation_marker,
        );
        self.store
            .insert(&record, &fingerprint)
            .await
            .map_err(|e| IngestionError::new(raw, format!("store insert failed: {:#}", e)))?;

        Ok(ItemOutcome::Inserted {
            identity,
            sub_fingerprints: fingerprint.len(),
        })
    }
}

/// Regular files of `directory` (not recursive) in the order the file system lists them.
fn list_files(directory: &Path) -> Result<Vec<SourceFile>, IngestionAbort> {
    let listing_error = |source| IngestionAbort::Listing {
        path: directory.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(listing_error)? {
        let path = entry.map_err(listing_error)?.path();
        if !path.is_file() {
            continue;
        }
        let raw_file_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(SourceFile {
            path,
            raw_file_name,
        });
    }
    Ok(files)
}
