//! SQLite-backed feed reader over the `feed_events` table.

use eventfeed_db::DbPool;
use eventfeed_types::{EventNumbers, FeedEvent};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::error::FeedError;
use crate::paging::{page_bounds, PageSize};
use crate::reader::FeedReader;

pub(crate) const EVENT_COLUMNS: &str = "sequence_number, event_id, event_name, \
     event_schema_version, payload, created_at, trace_id, span_id";

/// Reads the feed from pooled SQLite connections.
///
/// Each call checks out one connection and returns it before returning.
#[derive(Clone)]
pub struct SqliteFeedReader {
    pool: DbPool,
    page_size: PageSize,
}

impl SqliteFeedReader {
    pub fn new(pool: DbPool, page_size: PageSize) -> Self {
        Self { pool, page_size }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }
}

impl FeedReader for SqliteFeedReader {
    fn event_numbers(&self) -> Result<EventNumbers, FeedError> {
        let conn = self.pool.get()?;
        // Sequence numbers are gapless from 1, so the highest one is the count.
        let count: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM feed_events",
            [],
            |row| row.get(0),
        )?;
        Ok(EventNumbers {
            event_count: count.max(0) as u64,
            events_per_page: self.page_size.get(),
        })
    }

    fn read_page(&self, page_number: u64) -> Result<Vec<FeedEvent>, FeedError> {
        let bounds = page_bounds(page_number, self.page_size);
        let first = i64::try_from(*bounds.start()).unwrap_or(i64::MAX);
        let last = i64::try_from(*bounds.end()).unwrap_or(i64::MAX);

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS}
             FROM feed_events
             WHERE sequence_number BETWEEN ?1 AND ?2
             ORDER BY sequence_number ASC"
        ))?;
        let rows = stmt.query_map(params![first, last], map_row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

pub(crate) fn map_row_to_event(row: &Row) -> rusqlite::Result<FeedEvent> {
    let sequence_number: i64 = row.get(0)?;
    let event_id: String = row.get(1)?;
    let event_id = Uuid::parse_str(&event_id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(FeedEvent {
        event_id,
        sequence_number: u64::try_from(sequence_number)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, sequence_number))?,
        event_name: row.get(2)?,
        event_schema_version: row.get(3)?,
        payload: row.get(4)?,
        created_at: row.get(5)?,
        trace_id: row.get(6)?,
        span_id: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::Appender;
    use eventfeed_db::open_in_memory_store;
    use eventfeed_types::NewFeedEvent;

    fn test_pool() -> DbPool {
        open_in_memory_store().expect("should open store")
    }

    fn append_n(pool: &DbPool, n: usize) {
        let events = (0..n)
            .map(|i| NewFeedEvent::with_defaults("test-event", &serde_json::json!({ "i": i })))
            .collect::<Result<Vec<_>, _>>()
            .expect("payloads should serialize");
        Appender::new(pool.clone())
            .append_events(events)
            .expect("append should succeed");
    }

    #[test]
    fn empty_feed_counts_zero() {
        let reader = SqliteFeedReader::new(test_pool(), PageSize::new(10).unwrap());
        let numbers = reader.event_numbers().unwrap();
        assert_eq!(numbers.event_count, 0);
        assert_eq!(numbers.events_per_page, 10);
        assert!(reader.read_page(1).unwrap().is_empty());
    }

    #[test]
    fn read_page_returns_page_range_in_order() {
        let pool = test_pool();
        append_n(&pool, 25);
        let reader = SqliteFeedReader::new(pool, PageSize::new(10).unwrap());

        assert_eq!(reader.event_numbers().unwrap().event_count, 25);

        let second: Vec<u64> = reader
            .read_page(2)
            .unwrap()
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(second, (11..=20).collect::<Vec<_>>());

        assert_eq!(reader.read_page(3).unwrap().len(), 5);
        assert!(reader.read_page(4).unwrap().is_empty());
    }

    #[test]
    fn events_round_trip_through_the_table() {
        let pool = test_pool();
        let new = NewFeedEvent::with_defaults(
            "temperature-changed",
            &serde_json::json!({ "currentTemp": 20.5 }),
        )
        .unwrap()
        .schema_version(2);
        let committed = Appender::new(pool.clone())
            .append_events(vec![new.clone()])
            .unwrap()
            .remove(0);

        let reader = SqliteFeedReader::new(pool, PageSize::default());
        let read = reader.read_page(1).unwrap().remove(0);

        assert_eq!(read.sequence_number, committed.sequence_number);
        assert_eq!(read.event_id, new.event_id);
        assert_eq!(read.event_name, "temperature-changed");
        assert_eq!(read.trace_id, new.trace_id);
        assert_eq!(read.span_id, new.span_id);
        assert_eq!(
            read.created_at.timestamp_millis(),
            committed.created_at.timestamp_millis()
        );
        assert_eq!(read.event_schema_version, 2);
        assert_eq!(read.payload, r#"{"currentTemp":20.5}"#);
    }

    #[test]
    fn huge_page_numbers_read_nothing() {
        let pool = test_pool();
        append_n(&pool, 3);
        let reader = SqliteFeedReader::new(pool, PageSize::new(2).unwrap());
        assert!(reader.read_page(u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn event_count_is_the_highest_sequence_number() {
        let pool = test_pool();
        append_n(&pool, 7);
        append_n(&pool, 5);

        let conn = pool.get().unwrap();
        let (rows, max): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(sequence_number) FROM feed_events",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        drop(conn);
        assert_eq!(rows, max);

        let reader = SqliteFeedReader::new(pool, PageSize::new(10).unwrap());
        assert_eq!(reader.event_numbers().unwrap().event_count, 12);
    }
}
