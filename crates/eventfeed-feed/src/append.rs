//! Transactional append path.
//!
//! Events are written in the same SQLite transaction as the state change
//! that caused them, so a reader never sees one without the other. Sequence
//! numbers are computed inside the `INSERT` itself; SQLite's single writer
//! lock serialises concurrent appenders, which keeps the sequence gapless and
//! strictly increasing.

use chrono::Utc;
use eventfeed_db::DbPool;
use eventfeed_types::{FeedEvent, NewFeedEvent};
use rusqlite::{params, Transaction, TransactionBehavior};

use crate::error::AppendError;

/// Result of a successful [`Appender::append`].
#[derive(Debug)]
pub struct Appended<T> {
    /// Whatever the state mutation returned.
    pub value: T,
    /// The committed events, in sequence order.
    pub events: Vec<FeedEvent>,
}

/// Writes events together with a caller-supplied state mutation.
#[derive(Clone)]
pub struct Appender {
    pool: DbPool,
}

impl Appender {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs `mutation` and inserts `events` in one immediate transaction.
    ///
    /// The mutation runs first and sees the open transaction. If it fails,
    /// or if any insert or the commit fails, the whole transaction is rolled
    /// back and nothing is visible to readers.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::Mutation`] if `mutation` fails, and
    /// [`AppendError::Pool`] / [`AppendError::Database`] for store failures.
    pub fn append<T, E, F>(
        &self,
        events: Vec<NewFeedEvent>,
        mutation: F,
    ) -> Result<Appended<T>, AppendError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = mutation(&tx).map_err(|e| AppendError::Mutation(e.into()))?;
        let events = save_events(&tx, events)?;
        tx.commit()?;

        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            tracing::debug!(
                count = events.len(),
                first_seq = first.sequence_number,
                last_seq = last.sequence_number,
                "appended feed events"
            );
        }

        Ok(Appended { value, events })
    }

    /// Appends events with no accompanying state change.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::Pool`] or [`AppendError::Database`].
    pub fn append_events(&self, events: Vec<NewFeedEvent>) -> Result<Vec<FeedEvent>, AppendError> {
        self.append(events, |_| Ok::<_, rusqlite::Error>(()))
            .map(|appended| appended.events)
    }
}

/// Inserts `events` through an open transaction, assigning each the next
/// sequence number.
///
/// Use this when the caller already owns the transaction that performs the
/// domain write. The events become visible when the caller commits.
///
/// # Errors
///
/// Returns the SQLite error of the first failing insert; the caller's
/// transaction should then be dropped (rolled back).
pub fn save_events(
    tx: &Transaction<'_>,
    events: Vec<NewFeedEvent>,
) -> Result<Vec<FeedEvent>, rusqlite::Error> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO feed_events
            (sequence_number, event_id, event_name, event_schema_version,
             payload, created_at, trace_id, span_id)
         VALUES (
            (SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM feed_events),
            ?1, ?2, ?3, ?4, ?5, ?6, ?7
         )
         RETURNING sequence_number",
    )?;

    let mut committed = Vec::with_capacity(events.len());
    for event in events {
        let created_at = Utc::now();
        let seq: i64 = stmt.query_row(
            params![
                event.event_id.to_string(),
                event.event_name,
                event.event_schema_version,
                event.payload,
                created_at,
                event.trace_id,
                event.span_id,
            ],
            |row| row.get(0),
        )?;
        let seq = u64::try_from(seq).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, seq))?;
        committed.push(event.commit(seq, created_at));
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventfeed_db::{open_feed_store, open_in_memory_store, DbRuntimeSettings};

    fn test_pool() -> DbPool {
        let pool = open_in_memory_store().expect("should open store");
        pool.get()
            .expect("should get connection")
            .execute_batch(
                "CREATE TABLE temperatures (id INTEGER PRIMARY KEY, temp REAL NOT NULL);",
            )
            .expect("should create domain table");
        pool
    }

    fn event(name: &str) -> NewFeedEvent {
        NewFeedEvent::with_defaults(name, &serde_json::json!({ "currentTemp": 21.0 }))
            .expect("payload should serialize")
    }

    fn count(pool: &DbPool, table: &str) -> i64 {
        let conn = pool.get().expect("should get connection");
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("should count rows")
    }

    #[test]
    fn sequence_numbers_start_at_one_and_increase() {
        let appender = Appender::new(test_pool());

        let first = appender.append_events(vec![event("a"), event("b")]).unwrap();
        let second = appender.append_events(vec![event("c")]).unwrap();

        let seqs: Vec<u64> = first
            .iter()
            .chain(second.iter())
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn mutation_and_events_commit_together() {
        let pool = test_pool();
        let appender = Appender::new(pool.clone());

        let appended = appender
            .append(vec![event("temperature-changed")], |tx| {
                tx.execute("INSERT INTO temperatures (temp) VALUES (?1)", [21.0])?;
                Ok::<_, rusqlite::Error>(tx.last_insert_rowid())
            })
            .expect("append should succeed");

        assert_eq!(appended.value, 1);
        assert_eq!(appended.events.len(), 1);
        assert_eq!(count(&pool, "temperatures"), 1);
        assert_eq!(count(&pool, "feed_events"), 1);
    }

    #[test]
    fn failed_mutation_records_no_event() {
        let pool = test_pool();
        let appender = Appender::new(pool.clone());

        let err = appender
            .append(vec![event("temperature-changed")], |tx| {
                tx.execute("INSERT INTO temperatures (temp) VALUES (?1)", [21.0])
                    .map_err(|e| e.to_string())?;
                Err::<(), _>("validation failed".to_string())
            })
            .expect_err("mutation failure should abort the append");

        assert!(matches!(err, AppendError::Mutation(_)));
        assert_eq!(count(&pool, "temperatures"), 0);
        assert_eq!(count(&pool, "feed_events"), 0);
    }

    #[test]
    fn failed_event_insert_rolls_back_mutation() {
        let pool = test_pool();
        let appender = Appender::new(pool.clone());
        let duplicate = event("temperature-changed");

        let err = appender
            .append(vec![duplicate.clone(), duplicate], |tx| {
                tx.execute("INSERT INTO temperatures (temp) VALUES (?1)", [21.0])
            })
            .expect_err("duplicate event id should fail");

        assert!(matches!(err, AppendError::Database(_)));
        assert_eq!(count(&pool, "temperatures"), 0);
        assert_eq!(count(&pool, "feed_events"), 0);
    }

    #[test]
    fn save_events_joins_an_existing_transaction() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let tx = conn.transaction().unwrap();
        tx.execute("INSERT INTO temperatures (temp) VALUES (19.5)", []).unwrap();
        let saved = save_events(&tx, vec![event("temperature-changed")]).unwrap();
        drop(tx);

        assert_eq!(saved[0].sequence_number, 1);
        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM feed_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(events, 0, "dropping the transaction rolls the events back");
    }

    #[test]
    fn concurrent_appenders_produce_a_gapless_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let pool = open_feed_store(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let appender = Appender::new(pool.clone());
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        appender.append_events(vec![event("tick")]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let conn = pool.get().unwrap();
        let (count, min, max): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), MIN(sequence_number), MAX(sequence_number) FROM feed_events",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!((count, min, max), (100, 1, 100));
    }
}
