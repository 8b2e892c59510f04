// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::{Arc, Mutex};

use bgmprint_domain::TrackIdentity;

/// What happened to one file of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Inserted {
        identity: TrackIdentity,
        sub_fingerprints: usize,
    },
    Skipped {
        identity: TrackIdentity,
    },
    Failed {
        raw_file_name: String,
    },
}

/// Published after each processed file. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEvent {
    pub index: usize,
    pub total: usize,
    pub outcome: ItemOutcome,
}

/// Progress sink abstraction
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &IngestEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &IngestEvent) {}
}

/// A minimal in-memory sink that keeps published events.
#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    inner: Arc<Mutex<Vec<IngestEvent>>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("Failed to acquire lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve and clear all captured events
    pub fn drain(&self) -> Vec<IngestEvent> {
        let mut guard = self.inner.lock().expect("Failed to acquire lock");
        std::mem::take(&mut *guard)
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, event: &IngestEvent) {
        self.inner
            .lock()
            .expect("Failed to acquire lock")
            .push(event.clone());
    }
}
