//! Pooled SQLite connections tuned for an append-only log.

use std::time::Duration;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long an appender waits for the writer lock, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Pragmas applied to every connection the pool opens.
///
/// Readers never block the single writer under WAL, and `synchronous =
/// NORMAL` is durable across application crashes in that mode. In-memory
/// databases cannot use WAL and report `memory`, which is accepted.
#[derive(Debug, Clone, Copy)]
struct LogPragmas {
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for LogPragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get(0)
        })?;
        if !matches!(mode.as_str(), "wal" | "memory") {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("journal_mode stayed {mode:?} instead of wal")),
            ));
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(self.busy_timeout)
    }
}

/// Builds a pool over `db_path`, which may be `:memory:`.
///
/// Every pooled connection to `:memory:` opens its own database, so an
/// in-memory pool must have `pool_max_size = 1`.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connection cannot be opened
/// and tuned.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pragmas = LogPragmas {
        busy_timeout: Duration::from_millis(settings.busy_timeout_ms),
    };
    Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_customizer(Box::new(pragmas))
        .build(SqliteConnectionManager::file(db_path))
        .map_err(PoolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma<T: rusqlite::types::FromSql>(pool: &DbPool, name: &str) -> T {
        let conn = pool.get().expect("should get a connection");
        conn.pragma_query_value(None, name, |row| row.get(0))
            .expect("should read pragma")
    }

    #[test]
    fn in_memory_pool_applies_busy_timeout() {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                busy_timeout_ms: 2_500,
                pool_max_size: 1,
            },
        )
        .expect("pool creation should succeed");

        assert_eq!(pragma::<i64>(&pool, "busy_timeout"), 2_500);
        assert_eq!(pragma::<String>(&pool, "journal_mode"), "memory");
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn file_pool_runs_in_wal_with_normal_sync() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("feed.db");
        let pool = create_pool(
            path.to_str().expect("temp path should be utf-8"),
            DbRuntimeSettings::default(),
        )
        .expect("pool creation should succeed");

        assert_eq!(pragma::<String>(&pool, "journal_mode"), "wal");
        // NORMAL
        assert_eq!(pragma::<i64>(&pool, "synchronous"), 1);
    }
}
