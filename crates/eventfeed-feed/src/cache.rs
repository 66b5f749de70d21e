//! Completeness-aware caching for feed reads.
//!
//! A complete page can never change, so it is cached for a long time. The
//! tail page and the event count move with every append and are cached only
//! briefly: long enough to absorb a burst of polling clients, short enough
//! to bound how stale the frontier can look.
//!
//! ## Key space
//!
//! - one entry for the [`EventNumbers`] snapshot (short TTL)
//! - one entry per page number observed (long TTL if complete, short if not)
//!
//! ## Invariants
//!
//! - Only fully read pages are inserted. A failed or cancelled store read
//!   leaves the cache untouched, and errors are never cached.
//! - Completeness is one-way. A live complete entry is never replaced by an
//!   incomplete read of the same page.
//! - Locks are held only around map operations, never across a store read.
//!   Two concurrent misses on one key may both reach the store; the second
//!   insert wins unless the first was complete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use eventfeed_types::{EventNumbers, FeedEvent};

use crate::error::FeedError;
use crate::paging::{is_complete, PageSize};
use crate::reader::FeedReader;

/// Expiration policy of a [`FeedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Lifetime of a complete page.
    pub complete_page_ttl: Duration,
    /// Lifetime of an incomplete page and of the event count.
    pub incomplete_page_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            complete_page_ttl: Duration::from_secs(5 * 60),
            incomplete_page_ttl: Duration::from_secs(1),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Page entries currently held, expired or not.
    pub cached_pages: usize,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    complete: bool,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared cache state for one feed.
///
/// Construct one per process (or per test) and hand it to
/// [`CachingFeedReader`] explicitly.
#[derive(Debug)]
pub struct FeedCache {
    settings: CacheSettings,
    numbers: RwLock<Option<Entry<EventNumbers>>>,
    pages: RwLock<HashMap<u64, Entry<Arc<Vec<FeedEvent>>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FeedCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            numbers: RwLock::new(None),
            pages: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached_pages: read_lock(&self.pages).len(),
        }
    }

    /// Drops every expired entry and returns how many pages were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        {
            let mut numbers = write_lock(&self.numbers);
            if numbers.as_ref().is_some_and(|e| !e.is_live(now)) {
                *numbers = None;
            }
        }
        let mut pages = write_lock(&self.pages);
        let before = pages.len();
        pages.retain(|_, entry| entry.is_live(now));
        before - pages.len()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        *write_lock(&self.numbers) = None;
        write_lock(&self.pages).clear();
    }

    fn ttl(&self, complete: bool) -> Duration {
        if complete {
            self.settings.complete_page_ttl
        } else {
            self.settings.incomplete_page_ttl
        }
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_numbers(&self, now: Instant) -> Option<EventNumbers> {
        let cached = read_lock(&self.numbers)
            .as_ref()
            .filter(|e| e.is_live(now))
            .map(|e| e.value);
        self.record(cached.is_some());
        cached
    }

    fn put_numbers(&self, numbers: EventNumbers, now: Instant) {
        *write_lock(&self.numbers) = Some(Entry {
            value: numbers,
            complete: false,
            expires_at: now + self.settings.incomplete_page_ttl,
        });
    }

    fn get_page(&self, page_number: u64, now: Instant) -> Option<Arc<Vec<FeedEvent>>> {
        let cached = read_lock(&self.pages)
            .get(&page_number)
            .filter(|e| e.is_live(now))
            .map(|e| Arc::clone(&e.value));
        self.record(cached.is_some());
        cached
    }

    fn put_page(&self, page_number: u64, events: Arc<Vec<FeedEvent>>, complete: bool, now: Instant) {
        let mut pages = write_lock(&self.pages);
        if let Some(existing) = pages.get(&page_number) {
            if existing.complete && !complete && existing.is_live(now) {
                return;
            }
        }
        tracing::debug!(
            page = page_number,
            complete,
            events = events.len(),
            "caching feed page"
        );
        pages.insert(
            page_number,
            Entry {
                value: events,
                complete,
                expires_at: now + self.ttl(complete),
            },
        );
    }
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::error!("feed cache lock poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!("feed cache lock poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

/// A [`FeedReader`] that serves reads from a [`FeedCache`] and falls through
/// to `inner` on a miss.
pub struct CachingFeedReader<R> {
    inner: R,
    cache: Arc<FeedCache>,
}

impl<R: FeedReader> CachingFeedReader<R> {
    pub fn new(inner: R, cache: Arc<FeedCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<FeedCache> {
        &self.cache
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: FeedReader> FeedReader for CachingFeedReader<R> {
    fn event_numbers(&self) -> Result<EventNumbers, FeedError> {
        if let Some(numbers) = self.cache.get_numbers(Instant::now()) {
            return Ok(numbers);
        }

        let numbers = self.inner.event_numbers()?;
        self.cache.put_numbers(numbers, Instant::now());
        Ok(numbers)
    }

    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError> {
        if let Some(events) = self.cache.get_page(page_number, Instant::now()) {
            return Ok(events.as_ref().clone());
        }

        tracing::debug!(page = page_number, "feed page cache miss");
        let page_size = PageSize::new(self.event_numbers()?.events_per_page)?;
        let events = self.inner.read_page(page_number)?;
        let complete = is_complete(events.len(), page_size);
        self.cache
            .put_page(page_number, Arc::new(events.clone()), complete, Instant::now());
        Ok(events)
    }
}
