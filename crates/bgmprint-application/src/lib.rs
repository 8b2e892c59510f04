// SPDX-License-Identifier: GPL-3.0-or-later
pub mod events;
pub mod identity;
pub mod ingestion;
pub mod query;
pub mod result_filter;

pub use events::{EventSink, InMemoryEventSink, IngestEvent, ItemOutcome, NoopEventSink};
pub use identity::{IdentityResolver, ValidationFailure};
pub use ingestion::{IngestionAbort, IngestionPipeline};
pub use query::QueryPipeline;
pub use result_filter::ResultFilter;

#[cfg(test)]
mod test_support;
