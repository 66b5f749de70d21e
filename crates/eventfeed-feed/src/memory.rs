//! In-memory feed reader for tests and embedding.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use eventfeed_types::{
    EventNumbers, FeedEvent, NewFeedEvent, TraceContext, DEFAULT_SCHEMA_VERSION,
};
use uuid::Uuid;

use crate::error::FeedError;
use crate::paging::{page_bounds, PageSize};
use crate::reader::FeedReader;

/// A feed held in a vector, with store-access counters.
///
/// Sequence numbers are assigned on [`push`](Self::push) as `len + 1`, so the
/// log is gapless and `events[i].sequence_number == i + 1`.
#[derive(Debug)]
pub struct InMemoryFeedReader {
    page_size: PageSize,
    events: RwLock<Vec<FeedEvent>>,
    count_reads: AtomicU64,
    page_reads: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryFeedReader {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            events: RwLock::new(Vec::new()),
            count_reads: AtomicU64::new(0),
            page_reads: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Builds a feed holding `count` generated events.
    pub fn with_generated(page_size: PageSize, count: u64) -> Self {
        let reader = Self::new(page_size);
        reader.push_generated(count);
        reader
    }

    /// Commits `event` at the next sequence number.
    pub fn push(&self, event: NewFeedEvent) -> FeedEvent {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let committed = event.commit(events.len() as u64 + 1, Utc::now());
        events.push(committed.clone());
        committed
    }

    /// Appends `count` events named `test-event`.
    pub fn push_generated(&self, count: u64) {
        for _ in 0..count {
            let trace = TraceContext::generate();
            self.push(NewFeedEvent {
                event_id: Uuid::new_v4(),
                event_name: "test-event".to_string(),
                event_schema_version: DEFAULT_SCHEMA_VERSION,
                payload: r#"{"clicked":true}"#.to_string(),
                trace_id: trace.trace_id,
                span_id: trace.span_id,
            });
        }
    }

    /// Makes every subsequent read fail with [`FeedError::Unavailable`].
    #[cfg(any(test, feature = "testing"))]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `event_numbers` calls that reached this reader.
    #[cfg(any(test, feature = "testing"))]
    pub fn count_reads(&self) -> u64 {
        self.count_reads.load(Ordering::SeqCst)
    }

    /// Number of `read_page` calls that reached this reader.
    #[cfg(any(test, feature = "testing"))]
    pub fn page_reads(&self) -> u64 {
        self.page_reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), FeedError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FeedError::Unavailable("in-memory feed marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl FeedReader for InMemoryFeedReader {
    fn event_numbers(&self) -> Result<EventNumbers, FeedError> {
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        Ok(EventNumbers {
            event_count: events.len() as u64,
            events_per_page: self.page_size.get(),
        })
    }

    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError> {
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let bounds = page_bounds(page_number, self.page_size);
        Ok(events
            .iter()
            .filter(|e| bounds.contains(&e.sequence_number))
            .cloned()
            .collect())
    }
}
