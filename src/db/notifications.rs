//! Notification history
//!
//! Append-only record of dispatched alerts plus the queries the in-app
//! feed needs: latest per item, unread listing, mark-read and clear.

use crate::db::models::{now_timestamp, Channel, NewNotification, NotificationRecord, TriggerKind};
use crate::error::Result;
use rusqlite::{params, Connection, Row};

const RECORD_COLUMNS: &str =
    "id, watch_item_id, trigger_kind, price_at_trigger, created_at, delivered_channels, read, delivery_error";

fn map_record(row: &Row) -> rusqlite::Result<NotificationRecord> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<TriggerKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;

    let channels_json: String = row.get(5)?;
    let delivered_channels: Vec<Channel> = serde_json::from_str(&channels_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(NotificationRecord {
        id: row.get(0)?,
        watch_item_id: row.get(1)?,
        trigger_kind: kind,
        price_at_trigger: row.get(3)?,
        created_at: row.get(4)?,
        delivered_channels,
        read: row.get::<_, i32>(6)? == 1,
        delivery_error: row.get(7)?,
    })
}

/// Persist a notification; assigns id and timestamp
pub fn insert_notification(conn: &Connection, new: &NewNotification) -> Result<NotificationRecord> {
    let channels_json = serde_json::to_string(&new.delivered_channels)?;
    let created_at = now_timestamp();

    conn.execute(
        r#"
        INSERT INTO notifications
            (watch_item_id, trigger_kind, price_at_trigger, created_at, delivered_channels, delivery_error)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            new.watch_item_id,
            new.trigger_kind.as_str(),
            new.price_at_trigger,
            created_at,
            channels_json,
            new.delivery_error,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(
        "Recorded notification: item={}, kind={}, id={}",
        new.watch_item_id,
        new.trigger_kind,
        id
    );

    Ok(NotificationRecord {
        id,
        watch_item_id: new.watch_item_id,
        trigger_kind: new.trigger_kind,
        price_at_trigger: new.price_at_trigger,
        created_at,
        delivered_channels: new.delivered_channels.clone(),
        read: false,
        delivery_error: new.delivery_error.clone(),
    })
}

/// Latest notification for an item, if any.
///
/// This is what rebuilds the engine's dedup state after a restart.
pub fn latest_notification(conn: &Connection, watch_item_id: i64) -> Result<Option<NotificationRecord>> {
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM notifications WHERE watch_item_id = ?1 ORDER BY id DESC LIMIT 1",
            RECORD_COLUMNS
        ),
        params![watch_item_id],
        map_record,
    );

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Most recent notifications across all items, newest first
pub fn recent_notifications(conn: &Connection, limit: usize) -> Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM notifications ORDER BY id DESC LIMIT ?1",
        RECORD_COLUMNS
    ))?;

    let records = stmt
        .query_map(params![limit as i64], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// All unread notifications, oldest first
pub fn unread_notifications(conn: &Connection) -> Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM notifications WHERE read = 0 ORDER BY id ASC",
        RECORD_COLUMNS
    ))?;

    let records = stmt
        .query_map([], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Count unread notifications
pub fn count_unread(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE read = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Mark one notification read; returns false if the id is unknown
pub fn mark_read(conn: &Connection, id: i64) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(rows > 0)
}

/// Mark every notification read; returns rows changed
pub fn mark_all_read(conn: &Connection) -> Result<usize> {
    let rows = conn.execute("UPDATE notifications SET read = 1 WHERE read = 0", [])?;

    if rows > 0 {
        tracing::info!("Marked {} notifications as read", rows);
    }

    Ok(rows)
}

/// Delete the whole notification history; returns rows removed
pub fn clear_all(conn: &Connection) -> Result<usize> {
    let rows = conn.execute("DELETE FROM notifications", [])?;

    if rows > 0 {
        tracing::info!("Cleared {} notifications", rows);
    }

    Ok(rows)
}
