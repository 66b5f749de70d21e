//! Shared types for the event feed.
//!
//! These are the records that cross crate boundaries: the committed
//! [`FeedEvent`], the not-yet-committed [`NewFeedEvent`] handed to the
//! appender, and the [`EventNumbers`] snapshot that drives pagination.
//!
//! Nothing here performs I/O. Persistence lives in `eventfeed-feed`,
//! connection handling in `eventfeed-db`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version assigned by [`NewFeedEvent::with_defaults`].
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// A committed event in the feed.
///
/// Events are immutable once committed. The `sequence_number` is assigned by
/// the store at commit time and defines the total order of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    /// Globally unique event identifier.
    pub event_id: Uuid,
    /// Position of the event in the feed, starting at 1.
    pub sequence_number: u64,
    /// Tag naming the semantic type of the event (e.g. `temperature-changed`).
    pub event_name: String,
    /// Version of the payload shape for `event_name`.
    pub event_schema_version: u32,
    /// Serialized payload. Opaque to the feed.
    pub payload: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
    /// Distributed tracing correlation id.
    pub trace_id: String,
    /// Distributed tracing span id.
    pub span_id: String,
}

/// An event that has not been committed yet.
///
/// Carries everything except the sequence number and commit timestamp, both
/// of which are assigned when the event is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedEvent {
    pub event_id: Uuid,
    pub event_name: String,
    pub event_schema_version: u32,
    pub payload: String,
    pub trace_id: String,
    pub span_id: String,
}

impl NewFeedEvent {
    /// Builds an event with a fresh id, schema version 1, and fresh
    /// trace/span ids, serializing `payload` to JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `payload` cannot be serialized.
    pub fn with_defaults<T: Serialize>(
        event_name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_string(payload)?;
        let trace = TraceContext::generate();
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_name: event_name.into(),
            event_schema_version: DEFAULT_SCHEMA_VERSION,
            payload,
            trace_id: trace.trace_id,
            span_id: trace.span_id,
        })
    }

    /// Overrides the schema version.
    pub fn schema_version(mut self, version: u32) -> Self {
        self.event_schema_version = version;
        self
    }

    /// Attaches the given trace context instead of the generated one.
    pub fn traced(mut self, trace: TraceContext) -> Self {
        self.trace_id = trace.trace_id;
        self.span_id = trace.span_id;
        self
    }

    /// Completes the event with its store-assigned position and commit time.
    pub fn commit(self, sequence_number: u64, created_at: DateTime<Utc>) -> FeedEvent {
        FeedEvent {
            event_id: self.event_id,
            sequence_number,
            event_name: self.event_name,
            event_schema_version: self.event_schema_version,
            payload: self.payload,
            created_at,
            trace_id: self.trace_id,
            span_id: self.span_id,
        }
    }
}

/// Trace and span identifiers carried by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex characters.
    pub trace_id: String,
    /// 16 lowercase hex characters.
    pub span_id: String,
}

impl TraceContext {
    /// Generates random W3C-shaped trace and span ids.
    pub fn generate() -> Self {
        let trace_id = Uuid::new_v4().simple().to_string();
        let mut span_id = Uuid::new_v4().simple().to_string();
        span_id.truncate(16);
        Self { trace_id, span_id }
    }
}

/// Snapshot of the feed size and the configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNumbers {
    /// Number of committed events.
    pub event_count: u64,
    /// Events per page. Always at least 1.
    pub events_per_page: u64,
}
