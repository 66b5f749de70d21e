//! Schema migrations embedded at compile time.
//!
//! The applied set is read once from `_eventfeed_migrations`; every pending
//! migration then runs in its own transaction together with its tracking
//! row, so a failure leaves neither behind.

use std::collections::HashSet;

use rusqlite::Connection;
use thiserror::Error;

/// Tracking-table DDL. Runs before anything is read so a fresh database can
/// be inspected; it is idempotent and also recorded as `000_init`.
const TRACKING_DDL: &str = include_str!("migrations/000_init.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("000_init", TRACKING_DDL),
    ("001_feed_events", include_str!("migrations/001_feed_events.sql")),
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every pending migration and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError::StateQuery` if the tracking table cannot be
/// created or read, and `MigrationError::ExecutionFailed` naming the first
/// migration that could not be applied. That migration is rolled back in
/// full; earlier ones stay applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(
    conn: &Connection,
    migrations: &[(&'static str, &'static str)],
) -> Result<usize, MigrationError> {
    let applied = applied_names(conn)?;
    let pending: Vec<_> = migrations
        .iter()
        .filter(|(name, _)| !applied.contains(*name))
        .collect();

    for (name, sql) in &pending {
        tracing::info!(migration = name, "applying migration");
        apply_one(conn, name, sql).map_err(|source| MigrationError::ExecutionFailed {
            name: name.to_string(),
            source,
        })?;
    }

    Ok(pending.len())
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    conn.execute_batch(TRACKING_DDL)
        .map_err(MigrationError::StateQuery)?;
    let mut stmt = conn
        .prepare("SELECT name FROM _eventfeed_migrations")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<HashSet<_>, _>>())
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}

fn apply_one(conn: &Connection, name: &str, sql: &str) -> Result<(), rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.execute("INSERT INTO _eventfeed_migrations (name) VALUES (?1)", [name])?;
    tx.commit()
}
