//! Database layer for the event feed.
//!
//! [`open_feed_store`] is the entry point: it builds an `r2d2` pool whose
//! connections are tuned for the append-only log, applies the embedded
//! migrations and verifies that the `feed_events` table is in place.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer. The
//!   single writer is what serialises sequence number assignment.
//! - **`r2d2` connection pool**: a connection is checked out for one read or
//!   one append and returned on every exit path.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that depends on it.

mod migrations;
mod pool;
mod store;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use store::{
    open_feed_store, open_in_memory_store, StoreError, FEED_EVENTS_TABLE,
};
