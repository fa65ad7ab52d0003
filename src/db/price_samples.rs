//! Price sample history
//!
//! Append-only record of every successful price fetch, used for trend
//! display and kept across watch item removal.

use crate::db::models::PriceSample;
use crate::error::Result;
use rusqlite::{params, Connection};

/// Append a price sample; returns the new row id
pub fn insert_sample(
    conn: &Connection,
    watch_item_id: i64,
    price: f64,
    observed_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO price_samples (watch_item_id, price, observed_at) VALUES (?1, ?2, ?3)",
        params![watch_item_id, price, observed_at],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(
        "Recorded sample: item={}, price={}, id={}",
        watch_item_id,
        price,
        id
    );

    Ok(id)
}

/// Most recent samples for an item, newest first
pub fn recent_samples(conn: &Connection, watch_item_id: i64, limit: usize) -> Result<Vec<PriceSample>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, watch_item_id, price, observed_at
        FROM price_samples
        WHERE watch_item_id = ?1
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;

    let samples = stmt
        .query_map(params![watch_item_id, limit as i64], |row| {
            Ok(PriceSample {
                id: row.get(0)?,
                watch_item_id: row.get(1)?,
                price: row.get(2)?,
                observed_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(samples)
}

/// Latest sample for an item, if any
pub fn latest_sample(conn: &Connection, watch_item_id: i64) -> Result<Option<PriceSample>> {
    let mut samples = recent_samples(conn, watch_item_id, 1)?;
    Ok(samples.pop())
}

/// Count samples recorded for an item
pub fn count_samples(conn: &Connection, watch_item_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM price_samples WHERE watch_item_id = ?1",
        params![watch_item_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Delete samples older than the given number of days; returns rows removed.
/// Unsigned on purpose: a negative horizon would make the SQLite datetime
/// modifier evaluate to NULL and silently purge nothing.
pub fn purge_older_than(conn: &Connection, days: u32) -> Result<usize> {
    let rows = conn.execute(
        "DELETE FROM price_samples WHERE observed_at < datetime('now', ?1)",
        params![format!("-{} days", days)],
    )?;

    if rows > 0 {
        tracing::info!("Purged {} price samples older than {} days", rows, days);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::db::models::{NewWatchItem, Rating};
    use crate::db::watch_items;

    fn create_test_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        let item = watch_items::add_item(
            &conn,
            &NewWatchItem::new("NASDAQ:AAPL", "Apple Inc.", Rating::Buy),
        )
        .unwrap();
        (conn, item.id)
    }

    #[test]
    fn test_insert_and_recent_order() {
        let (conn, item_id) = create_test_db();

        insert_sample(&conn, item_id, 100.0, "2025-03-14 10:00:00").unwrap();
        insert_sample(&conn, item_id, 101.5, "2025-03-14 10:01:00").unwrap();
        insert_sample(&conn, item_id, 99.8, "2025-03-14 10:02:00").unwrap();

        let samples = recent_samples(&conn, item_id, 2).unwrap();
        assert_eq!(samples.len(), 2);
        // Newest first
        assert_eq!(samples[0].price, 99.8);
        assert_eq!(samples[1].price, 101.5);

        assert_eq!(count_samples(&conn, item_id).unwrap(), 3);
    }

    #[test]
    fn test_latest_sample() {
        let (conn, item_id) = create_test_db();

        assert!(latest_sample(&conn, item_id).unwrap().is_none());

        insert_sample(&conn, item_id, 42.0, "2025-03-14 10:00:00").unwrap();
        let latest = latest_sample(&conn, item_id).unwrap().unwrap();
        assert_eq!(latest.price, 42.0);
        assert_eq!(latest.watch_item_id, item_id);
    }

    #[test]
    fn test_purge_older_than() {
        let (conn, item_id) = create_test_db();

        insert_sample(&conn, item_id, 10.0, "2020-01-01 00:00:00").unwrap();
        insert_sample(&conn, item_id, 11.0, "2020-01-02 00:00:00").unwrap();
        let recent = crate::db::models::now_timestamp();
        insert_sample(&conn, item_id, 12.0, &recent).unwrap();

        let purged = purge_older_than(&conn, 30).unwrap();
        assert_eq!(purged, 2);
        assert_eq!(count_samples(&conn, item_id).unwrap(), 1);
        assert_eq!(latest_sample(&conn, item_id).unwrap().unwrap().price, 12.0);

        // A horizon past all remaining rows removes nothing
        assert_eq!(purge_older_than(&conn, 36_500).unwrap(), 0);
        assert_eq!(count_samples(&conn, item_id).unwrap(), 1);
    }
}
