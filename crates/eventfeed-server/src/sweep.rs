//! Background task that drops expired read-cache entries.

use eventfeed_feed::FeedCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Starts a background task that periodically purges expired entries from
/// `cache`, so pages nobody asks for again do not stay resident.
///
/// This task runs indefinitely.
pub async fn start_cache_sweep_task(cache: Arc<FeedCache>, interval_seconds: u64) {
    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, "starting feed cache sweep task");

    loop {
        sleep(interval).await;

        let purged = cache.purge_expired();
        let stats = cache.stats();
        if purged > 0 {
            tracing::debug!(
                purged,
                cached_pages = stats.cached_pages,
                hits = stats.hits,
                misses = stats.misses,
                "purged expired feed cache entries"
            );
        }
    }
}
