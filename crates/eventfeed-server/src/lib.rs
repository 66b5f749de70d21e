//! Event feed HTTP server.
//!
//! Mounts the feed protocol on an axum router. Feed paths are answered by
//! [`middleware::feed_middleware`]; everything else falls through to the
//! router's own routes.

pub mod config;
pub mod middleware;
pub mod sweep;

use std::sync::Arc;

use axum::{http::Method, routing::get, Json, Router};
use eventfeed_db::DbPool;
use eventfeed_feed::{
    BasePath, CacheSettings, CachingFeedReader, Dispatcher, FeedCache, FeedReader, PageSize,
    SqliteFeedReader,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// How the feed is mounted and read.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub base_path: BasePath,
    pub page_size: PageSize,
    /// Server-side read cache; `None` reads the store on every request.
    pub cache: Option<CacheSettings>,
    /// Lifetimes advertised to HTTP caches through `Cache-Control`.
    pub max_age: CacheSettings,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            base_path: BasePath::default(),
            page_size: PageSize::default(),
            cache: Some(CacheSettings::default()),
            max_age: CacheSettings::default(),
        }
    }
}

impl FeedOptions {
    /// Builds the application state over `reader`, wrapping it in a
    /// [`CachingFeedReader`] when caching is enabled.
    pub fn build<R: FeedReader + 'static>(self, reader: R) -> AppState {
        let cache = self.cache.map(|settings| Arc::new(FeedCache::new(settings)));
        let reader: Arc<dyn FeedReader> = match &cache {
            Some(cache) => Arc::new(CachingFeedReader::new(reader, Arc::clone(cache))),
            None => Arc::new(reader),
        };

        AppState {
            dispatcher: Arc::new(Dispatcher::new(self.base_path, reader)),
            cache,
            max_age: self.max_age,
        }
    }

    /// Builds the application state over the `feed_events` table.
    pub fn sqlite(self, pool: DbPool) -> AppState {
        let reader = SqliteFeedReader::new(pool, self.page_size);
        self.build(reader)
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Classifies and answers feed requests.
    pub dispatcher: Arc<Dispatcher<Arc<dyn FeedReader>>>,
    /// The read cache, when enabled. Shared with the sweep task.
    pub cache: Option<Arc<FeedCache>>,
    pub max_age: CacheSettings,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::feed_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
}
