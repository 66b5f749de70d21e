//! Opening a ready-to-use feed store.

use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};
use crate::pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

/// The table every feed reader and appender works against.
pub const FEED_EVENTS_TABLE: &str = "feed_events";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to check out a connection: {0}")]
    Connection(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("failed to inspect schema: {0}")]
    Query(rusqlite::Error),

    #[error("table '{0}' is missing after migrations")]
    MissingTable(&'static str),
}

/// Opens the pool at `db_path`, brings the schema up to date and confirms
/// the feed table exists.
///
/// # Errors
///
/// Fails if the pool cannot be built, a migration fails, or `feed_events`
/// is still absent afterwards.
pub fn open_feed_store(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, StoreError> {
    let pool = create_pool(db_path, settings)?;
    let conn = pool.get()?;

    let applied = run_migrations(&conn)?;
    if applied > 0 {
        tracing::info!(db_path, applied, "feed store migrated");
    }

    let present: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [FEED_EVENTS_TABLE],
            |row| row.get(0),
        )
        .map_err(StoreError::Query)?;
    if !present {
        return Err(StoreError::MissingTable(FEED_EVENTS_TABLE));
    }

    drop(conn);
    Ok(pool)
}

/// A migrated single-connection store that lives only as long as the pool.
pub fn open_in_memory_store() -> Result<DbPool, StoreError> {
    open_feed_store(
        ":memory:",
        DbRuntimeSettings {
            pool_max_size: 1,
            ..DbRuntimeSettings::default()
        },
    )
}
