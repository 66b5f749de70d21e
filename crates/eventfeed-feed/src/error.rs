//! Error types for feed reads and appends.

use thiserror::Error;

/// Errors raised while reading the feed or validating feed settings.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A database operation failed.
    #[error("feed database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("feed connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The backing store refused the operation.
    #[error("feed store unavailable: {0}")]
    Unavailable(String),

    /// `events_per_page` must be at least 1.
    #[error("events per page must be at least 1, got {0}")]
    InvalidPageSize(u64),

    /// The feed base path is not an absolute path with at least one segment.
    #[error("invalid feed base path: {0:?}")]
    InvalidBasePath(String),
}

/// Errors raised by [`crate::Appender`].
///
/// Whatever the variant, the state mutation and the events were rolled back
/// together.
#[derive(Debug, Error)]
pub enum AppendError {
    /// No pooled connection could be obtained.
    #[error("append connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Beginning, writing, or committing the transaction failed.
    #[error("append database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The caller's state mutation failed.
    #[error("state mutation failed: {0}")]
    Mutation(#[source] Box<dyn std::error::Error + Send + Sync>),
}
