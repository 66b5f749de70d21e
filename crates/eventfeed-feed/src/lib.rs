//! The event feed protocol.
//!
//! Exposes an append-only, totally ordered log of events as fixed-size pages
//! that clients walk with hypermedia links. A page holding exactly
//! `events_per_page` events is *complete* and never changes again; the last
//! page (the *tail*) may still grow.
//!
//! # Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`paging`] | page count, page bounds, completeness |
//! | [`links`] | navigation links derived from base path and page number |
//! | [`FeedReader`] | read contract over any backing store |
//! | [`CachingFeedReader`] | completeness-aware caching decorator |
//! | [`Dispatcher`] | request classification and response documents |
//! | [`Appender`] | outbox-style transactional append |
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventfeed_feed::{Appender, NewFeedEvent};
//!
//! let appender = Appender::new(pool.clone());
//! appender.append(vec![NewFeedEvent::with_defaults("temperature-changed", &change)?], |tx| {
//!     tx.execute("UPDATE temperatures SET temperature = ?1", [change.current_temp])
//! })?;
//! ```

mod append;
mod cache;
mod dispatch;
mod error;
pub mod links;
mod memory;
pub mod paging;
mod reader;
mod route;
mod sqlite;

pub use append::{save_events, Appended, Appender};
pub use cache::{CacheSettings, CacheStats, CachingFeedReader, FeedCache};
pub use dispatch::{
    Dispatcher, FeedResponse, MetaDocument, PageDocument, ProblemDocument, ProblemLinks,
    PROBLEM_MALFORMED_PAGE, PROBLEM_PAGE_NOT_FOUND, PROBLEM_STORE_UNAVAILABLE,
};
pub use error::{AppendError, FeedError};
pub use eventfeed_types::{EventNumbers, FeedEvent, NewFeedEvent, TraceContext};
pub use links::{BasePath, Link, MetaLinks, PageLinks};
pub use memory::InMemoryFeedReader;
pub use paging::PageSize;
pub use reader::FeedReader;
pub use route::{classify, RequestKind};
pub use sqlite::SqliteFeedReader;
