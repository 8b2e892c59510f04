// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bgmprint_domain::MatchResult;
use bgmprint_fingerprint::{AudioDecoder, FingerprintingEngine};
use bgmprint_infrastructure::FingerprintStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::result_filter::ResultFilter;

/// Fingerprints one file and looks it up in the store.
pub struct QueryPipeline<'a> {
    engine: Arc<dyn FingerprintingEngine>,
    decoder: Arc<dyn AudioDecoder>,
    store: &'a dyn FingerprintStore,
    filter: ResultFilter,
    cancel: CancellationToken,
}

impl<'a> QueryPipeline<'a> {
    pub fn new(
        engine: Arc<dyn FingerprintingEngine>,
        decoder: Arc<dyn AudioDecoder>,
        store: &'a dyn FingerprintStore,
        filter: ResultFilter,
    ) -> Self {
        Self {
            engine,
            decoder,
            store,
            filter,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Matches above the confidence threshold, best first.
    ///
    /// The store returns its candidates in one batch, so the retained matches
    /// are collected before returning rather than filtered lazily.
    #[instrument(skip(self), fields(file = %query_file.display()))]
    pub async fn query_match(
        &self,
        query_file: &Path,
    ) -> Result<std::vec::IntoIter<MatchResult>> {
        let candidates = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => bail!("query interrupted"),
            candidates = self.search(query_file) => candidates?,
        };

        if candidates.is_empty() {
            info!(target: "query", "no matches in store");
        } else {
            debug!(target: "query", candidates = candidates.len(), "store returned candidates");
        }
        let retained: Vec<_> = self.filter.filter_and_rank(candidates).collect();
        Ok(retained.into_iter())
    }

    /// Record retained matches so later runs can use them.
    pub async fn register_matches(&self, query_file: &Path, matches: &[MatchResult]) -> Result<()> {
        let query = query_file.display().to_string();
        for result in matches {
            self.store
                .register_match(&query, result)
                .await
                .with_context(|| format!("registering match {}", result.matched_identity))?;
        }
        Ok(())
    }

    async fn search(&self, query_file: &Path) -> Result<Vec<MatchResult>> {
        let fingerprint = self
            .engine
            .fingerprint(query_file, self.decoder.clone())
            .await
            .with_context(|| format!("fingerprinting {}", query_file.display()))?;
        debug!(target: "query", items = fingerprint.len(), "query fingerprinted");
        self.store.search(&fingerprint).await
    }
}
