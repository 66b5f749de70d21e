//! The feed read contract.

use std::sync::Arc;

use eventfeed_types::{EventNumbers, FeedEvent};

use crate::error::FeedError;

/// Read access to a feed.
///
/// Calls may block on I/O; async callers run them on a blocking thread.
/// The two methods are not observed atomically: the log may grow between an
/// [`event_numbers`](FeedReader::event_numbers) call and a subsequent
/// [`read_page`](FeedReader::read_page).
pub trait FeedReader: Send + Sync {
    /// Current event count and the configured page size.
    fn event_numbers(&self) -> Result<EventNumbers, FeedError>;

    /// Events of page `page_number` (1-based) in ascending sequence order.
    ///
    /// Returns at most `events_per_page` events. A page beyond the end of the
    /// feed yields an empty vector rather than an error.
    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError>;
}

impl<R: FeedReader + ?Sized> FeedReader for Arc<R> {
    fn event_numbers(&self) -> Result<EventNumbers, FeedError> {
        (**self).event_numbers()
    }

    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError> {
        (**self).read_page(page_number)
    }
}

impl<R: FeedReader + ?Sized> FeedReader for Box<R> {
    fn event_numbers(&self) -> Result<EventNumbers, FeedError> {
        (**self).event_numbers()
    }

    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError> {
        (**self).read_page(page_number)
    }
}
