//! Watch item storage
//!
//! CRUD for the monitored-symbol table. Symbols are unique among active
//! items only; removal marks a row inactive so its sample and notification
//! history survives.

use crate::db::models::{now_timestamp, BatchOutcome, NewWatchItem, Rating, WatchItem, WatchItemPatch};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, Row};

/// Bounds for the per-item check interval, in seconds
pub const MIN_CHECK_INTERVAL: i64 = 30;
pub const MAX_CHECK_INTERVAL: i64 = 300;

/// Clamp a requested check interval into the supported range
pub fn clamp_interval(seconds: i64) -> i64 {
    seconds.clamp(MIN_CHECK_INTERVAL, MAX_CHECK_INTERVAL)
}

const ITEM_COLUMNS: &str = "id, symbol, display_name, rating, entry_min, entry_max, take_profit, \
     stop_loss, check_interval_seconds, notifications_enabled, active, last_checked_at, \
     last_price, created_at";

fn map_item(row: &Row) -> rusqlite::Result<WatchItem> {
    let rating: String = row.get(3)?;
    let rating = rating.parse::<Rating>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(WatchItem {
        id: row.get(0)?,
        symbol: row.get(1)?,
        display_name: row.get(2)?,
        rating,
        entry_min: row.get(4)?,
        entry_max: row.get(5)?,
        take_profit: row.get(6)?,
        stop_loss: row.get(7)?,
        check_interval_seconds: row.get(8)?,
        notifications_enabled: row.get::<_, i32>(9)? == 1,
        active: row.get::<_, i32>(10)? == 1,
        last_checked_at: row.get(11)?,
        last_price: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn validate_bounds(
    entry_min: Option<f64>,
    entry_max: Option<f64>,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
) -> Result<()> {
    for (name, value) in [
        ("entry_min", entry_min),
        ("entry_max", entry_max),
        ("take_profit", take_profit),
        ("stop_loss", stop_loss),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(AppError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }
    }

    if let (Some(min), Some(max)) = (entry_min, entry_max) {
        if min > max {
            return Err(AppError::Validation(format!(
                "entry_min ({}) must not exceed entry_max ({})",
                min, max
            )));
        }
    }

    Ok(())
}

fn active_symbol_exists(conn: &Connection, symbol: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM watch_items WHERE symbol = ?1 AND active = 1)",
        params![symbol],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Add a new watch item
///
/// Fails with `DuplicateSymbol` if an active item already uses the symbol.
/// The check interval is clamped to [30, 300] seconds.
pub fn add_item(conn: &Connection, req: &NewWatchItem) -> Result<WatchItem> {
    let symbol = req.symbol.trim();
    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".to_string()));
    }

    validate_bounds(req.entry_min, req.entry_max, req.take_profit, req.stop_loss)?;

    if active_symbol_exists(conn, symbol)? {
        return Err(AppError::DuplicateSymbol(symbol.to_string()));
    }

    let interval = clamp_interval(req.check_interval_seconds);

    conn.execute(
        r#"
        INSERT INTO watch_items
            (symbol, display_name, rating, entry_min, entry_max, take_profit, stop_loss,
             check_interval_seconds, notifications_enabled, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            symbol,
            req.display_name,
            req.rating.as_str(),
            req.entry_min,
            req.entry_max,
            req.take_profit,
            req.stop_loss,
            interval,
            req.notifications_enabled as i32,
            now_timestamp(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!("Added watch item '{}' with id {}", symbol, id);

    get_item(conn, id)?
        .ok_or_else(|| AppError::Internal(format!("Watch item {} vanished after insert", id)))
}

/// Get a watch item by id (active or not)
pub fn get_item(conn: &Connection, id: i64) -> Result<Option<WatchItem>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM watch_items WHERE id = ?1", ITEM_COLUMNS),
        params![id],
        map_item,
    );

    match result {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get the active watch item for a symbol, if any
pub fn get_by_symbol(conn: &Connection, symbol: &str) -> Result<Option<WatchItem>> {
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM watch_items WHERE symbol = ?1 AND active = 1",
            ITEM_COLUMNS
        ),
        params![symbol.trim()],
        map_item,
    );

    match result {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Apply a partial update to a watch item
///
/// Fails with `NotFound` if the id does not exist. The merged bounds are
/// re-validated so an update can never leave entry_min above entry_max.
pub fn update_item(conn: &Connection, id: i64, patch: &WatchItemPatch) -> Result<WatchItem> {
    let current = get_item(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("Watch item {}", id)))?;

    let entry_min = patch.entry_min.unwrap_or(current.entry_min);
    let entry_max = patch.entry_max.unwrap_or(current.entry_max);
    let take_profit = patch.take_profit.unwrap_or(current.take_profit);
    let stop_loss = patch.stop_loss.unwrap_or(current.stop_loss);
    validate_bounds(entry_min, entry_max, take_profit, stop_loss)?;

    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(name) = &patch.display_name {
        updates.push("display_name = ?");
        params.push(Box::new(name.clone()));
    }
    if let Some(rating) = patch.rating {
        updates.push("rating = ?");
        params.push(Box::new(rating.as_str()));
    }
    if let Some(v) = patch.entry_min {
        updates.push("entry_min = ?");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.entry_max {
        updates.push("entry_max = ?");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.take_profit {
        updates.push("take_profit = ?");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.stop_loss {
        updates.push("stop_loss = ?");
        params.push(Box::new(v));
    }
    if let Some(interval) = patch.check_interval_seconds {
        updates.push("check_interval_seconds = ?");
        params.push(Box::new(clamp_interval(interval)));
    }
    if let Some(enabled) = patch.notifications_enabled {
        updates.push("notifications_enabled = ?");
        params.push(Box::new(enabled as i32));
    }

    if !updates.is_empty() {
        let sql = format!("UPDATE watch_items SET {} WHERE id = ?", updates.join(", "));
        params.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_item(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("Watch item {}", id)))
}

/// Mark a watch item inactive; its history is kept
pub fn remove_item(conn: &Connection, id: i64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE watch_items SET active = 0 WHERE id = ?1",
        params![id],
    )?;

    if rows == 0 {
        return Err(AppError::NotFound(format!("Watch item {}", id)));
    }

    tracing::info!("Removed watch item {}", id);
    Ok(())
}

/// Set the active flag directly
pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<()> {
    let rows = conn.execute(
        "UPDATE watch_items SET active = ?1 WHERE id = ?2",
        params![active as i32, id],
    )?;

    if rows == 0 {
        return Err(AppError::NotFound(format!("Watch item {}", id)));
    }

    Ok(())
}

/// All active watch items, in insertion order
pub fn list_active(conn: &Connection) -> Result<Vec<WatchItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM watch_items WHERE active = 1 ORDER BY id ASC",
        ITEM_COLUMNS
    ))?;

    let items = stmt
        .query_map([], map_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(items)
}

/// All watch items including inactive ones, in insertion order
pub fn list_all(conn: &Connection) -> Result<Vec<WatchItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM watch_items ORDER BY id ASC",
        ITEM_COLUMNS
    ))?;

    let items = stmt
        .query_map([], map_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(items)
}

/// Count active watch items
pub fn count_active(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM watch_items WHERE active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Flip the notifications flag; returns the new state
pub fn toggle_notifications(conn: &Connection, id: i64) -> Result<bool> {
    let item = get_item(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("Watch item {}", id)))?;

    let enabled = !item.notifications_enabled;
    conn.execute(
        "UPDATE watch_items SET notifications_enabled = ?1 WHERE id = ?2",
        params![enabled as i32, id],
    )?;

    tracing::info!("Notifications for watch item {} set to {}", id, enabled);
    Ok(enabled)
}

/// Record the result of a successful price check on the item row
pub fn touch_check(conn: &Connection, id: i64, price: f64, checked_at: &str) -> Result<()> {
    conn.execute(
        "UPDATE watch_items SET last_price = ?1, last_checked_at = ?2 WHERE id = ?3",
        params![price, checked_at, id],
    )?;
    Ok(())
}

/// Import a batch of items: insert unknown symbols, refresh known ones.
///
/// A known symbol (active or not) gets its display name, rating, bounds and
/// interval replaced and is re-activated; its notifications flag is left
/// alone so a local mute survives re-imports. Runs in one transaction.
pub fn batch_upsert(conn: &mut Connection, items: &[NewWatchItem]) -> Result<BatchOutcome> {
    let tx = conn.transaction()?;
    let mut outcome = BatchOutcome::default();

    for req in items {
        let symbol = req.symbol.trim();
        if symbol.is_empty() {
            return Err(AppError::Validation("Symbol must not be empty".to_string()));
        }
        validate_bounds(req.entry_min, req.entry_max, req.take_profit, req.stop_loss)?;
        let interval = clamp_interval(req.check_interval_seconds);

        // Prefer the active row when both an active and an archived row exist
        let existing: Option<i64> = match tx.query_row(
            "SELECT id FROM watch_items WHERE symbol = ?1 ORDER BY active DESC, id DESC LIMIT 1",
            params![symbol],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        match existing {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE watch_items
                    SET display_name = ?1, rating = ?2, entry_min = ?3, entry_max = ?4,
                        take_profit = ?5, stop_loss = ?6, check_interval_seconds = ?7, active = 1
                    WHERE id = ?8
                    "#,
                    params![
                        req.display_name,
                        req.rating.as_str(),
                        req.entry_min,
                        req.entry_max,
                        req.take_profit,
                        req.stop_loss,
                        interval,
                        id,
                    ],
                )?;
                outcome.updated += 1;
            }
            None => {
                tx.execute(
                    r#"
                    INSERT INTO watch_items
                        (symbol, display_name, rating, entry_min, entry_max, take_profit,
                         stop_loss, check_interval_seconds, notifications_enabled, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        symbol,
                        req.display_name,
                        req.rating.as_str(),
                        req.entry_min,
                        req.entry_max,
                        req.take_profit,
                        req.stop_loss,
                        interval,
                        req.notifications_enabled as i32,
                        now_timestamp(),
                    ],
                )?;
                outcome.added += 1;
            }
        }
    }

    tx.commit()?;
    tracing::info!(
        "Batch import finished: {} added, {} updated",
        outcome.added,
        outcome.updated
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::db::models::parse_timestamp;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_request(symbol: &str) -> NewWatchItem {
        NewWatchItem {
            take_profit: Some(200.0),
            stop_loss: Some(120.0),
            ..NewWatchItem::new(symbol, "Test Stock", Rating::Buy)
        }
    }

    #[test]
    fn test_add_and_get() {
        let conn = create_test_db();

        let item = add_item(&conn, &sample_request("NASDAQ:AAPL")).unwrap();
        assert!(item.id > 0);
        assert_eq!(item.symbol, "NASDAQ:AAPL");
        assert_eq!(item.rating, Rating::Buy);
        assert_eq!(item.take_profit, Some(200.0));
        assert!(item.active);
        assert!(item.notifications_enabled);
        assert!(item.last_checked_at.is_none());
        assert!(item.last_price.is_none());
        assert!(parse_timestamp(&item.created_at).is_some());

        let fetched = get_item(&conn, item.id).unwrap().unwrap();
        assert_eq!(fetched.symbol, item.symbol);

        assert!(get_item(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_symbol_only_against_active() {
        let conn = create_test_db();

        let first = add_item(&conn, &sample_request("NYSE:KO")).unwrap();

        let err = add_item(&conn, &sample_request("NYSE:KO")).unwrap_err();
        assert!(matches!(err, AppError::DuplicateSymbol(_)));

        // After removal the symbol is free again
        remove_item(&conn, first.id).unwrap();
        let second = add_item(&conn, &sample_request("NYSE:KO")).unwrap();
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn test_interval_clamping() {
        let conn = create_test_db();

        let mut req = sample_request("A");
        req.check_interval_seconds = 0;
        assert_eq!(add_item(&conn, &req).unwrap().check_interval_seconds, 30);

        let mut req = sample_request("B");
        req.check_interval_seconds = -5;
        assert_eq!(add_item(&conn, &req).unwrap().check_interval_seconds, 30);

        let mut req = sample_request("C");
        req.check_interval_seconds = 10000;
        assert_eq!(add_item(&conn, &req).unwrap().check_interval_seconds, 300);

        let mut req = sample_request("D");
        req.check_interval_seconds = 120;
        assert_eq!(add_item(&conn, &req).unwrap().check_interval_seconds, 120);
    }

    #[test]
    fn test_bounds_validation() {
        let conn = create_test_db();

        let mut req = sample_request("BAD:RANGE");
        req.entry_min = Some(50.0);
        req.entry_max = Some(40.0);
        assert!(matches!(
            add_item(&conn, &req).unwrap_err(),
            AppError::Validation(_)
        ));

        let mut req = sample_request("BAD:NEG");
        req.stop_loss = Some(-1.0);
        assert!(matches!(
            add_item(&conn, &req).unwrap_err(),
            AppError::Validation(_)
        ));

        let mut req = sample_request("BAD:EMPTY");
        req.symbol = "   ".to_string();
        assert!(matches!(
            add_item(&conn, &req).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_update_patch() {
        let conn = create_test_db();
        let item = add_item(&conn, &sample_request("NASDAQ:MSFT")).unwrap();

        let patch = WatchItemPatch {
            display_name: Some("Microsoft".to_string()),
            rating: Some(Rating::Hold),
            take_profit: Some(None),
            check_interval_seconds: Some(99999),
            ..Default::default()
        };

        let updated = update_item(&conn, item.id, &patch).unwrap();
        assert_eq!(updated.display_name, "Microsoft");
        assert_eq!(updated.rating, Rating::Hold);
        assert_eq!(updated.take_profit, None);
        assert_eq!(updated.check_interval_seconds, 300);
        // Untouched fields survive
        assert_eq!(updated.stop_loss, Some(120.0));

        let err = update_item(&conn, 9999, &WatchItemPatch::default()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_update_rejects_inverted_merged_bounds() {
        let conn = create_test_db();
        let mut req = sample_request("NASDAQ:NVDA");
        req.entry_min = Some(100.0);
        req.entry_max = Some(110.0);
        let item = add_item(&conn, &req).unwrap();

        // Raising only entry_min above the existing entry_max must fail
        let patch = WatchItemPatch {
            entry_min: Some(Some(120.0)),
            ..Default::default()
        };
        assert!(matches!(
            update_item(&conn, item.id, &patch).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_remove_marks_inactive_and_keeps_row() {
        let conn = create_test_db();
        let item = add_item(&conn, &sample_request("NYSE:GE")).unwrap();

        remove_item(&conn, item.id).unwrap();

        assert!(list_active(&conn).unwrap().is_empty());
        let all = list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);

        // Removing again is a no-op, not an error
        remove_item(&conn, item.id).unwrap();

        let err = remove_item(&conn, 9999).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_list_active_insertion_order() {
        let conn = create_test_db();
        let a = add_item(&conn, &sample_request("AAA")).unwrap();
        let b = add_item(&conn, &sample_request("BBB")).unwrap();
        let c = add_item(&conn, &sample_request("CCC")).unwrap();

        remove_item(&conn, b.id).unwrap();

        let active = list_active(&conn).unwrap();
        let ids: Vec<i64> = active.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(count_active(&conn).unwrap(), 2);
    }

    #[test]
    fn test_toggle_notifications() {
        let conn = create_test_db();
        let item = add_item(&conn, &sample_request("NYSE:F")).unwrap();

        assert!(!toggle_notifications(&conn, item.id).unwrap());
        assert!(toggle_notifications(&conn, item.id).unwrap());
    }

    #[test]
    fn test_set_active_reactivates() {
        let conn = create_test_db();
        let item = add_item(&conn, &sample_request("NYSE:X")).unwrap();

        remove_item(&conn, item.id).unwrap();
        assert!(list_active(&conn).unwrap().is_empty());

        set_active(&conn, item.id, true).unwrap();
        let active = list_active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, item.id);

        assert!(matches!(
            set_active(&conn, 9999, true).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_touch_check() {
        let conn = create_test_db();
        let item = add_item(&conn, &sample_request("NYSE:T")).unwrap();

        touch_check(&conn, item.id, 19.42, "2025-03-14 10:00:00").unwrap();

        let updated = get_item(&conn, item.id).unwrap().unwrap();
        assert_eq!(updated.last_price, Some(19.42));
        assert_eq!(updated.last_checked_at.as_deref(), Some("2025-03-14 10:00:00"));
    }

    #[test]
    fn test_batch_upsert() {
        let mut conn = create_test_db();

        let existing = add_item(&conn, &sample_request("NYSE:IBM")).unwrap();
        toggle_notifications(&conn, existing.id).unwrap();
        let archived = add_item(&conn, &sample_request("NYSE:GM")).unwrap();
        remove_item(&conn, archived.id).unwrap();

        let mut refreshed = sample_request("NYSE:IBM");
        refreshed.rating = Rating::Sell;
        let outcome = batch_upsert(
            &mut conn,
            &[refreshed, sample_request("NYSE:GM"), sample_request("NYSE:NEW")],
        )
        .unwrap();

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.updated, 2);

        let ibm = get_by_symbol(&conn, "NYSE:IBM").unwrap().unwrap();
        assert_eq!(ibm.id, existing.id);
        assert_eq!(ibm.rating, Rating::Sell);
        // Local mute survives a re-import
        assert!(!ibm.notifications_enabled);

        // The archived row was re-activated rather than duplicated
        let gm = get_by_symbol(&conn, "NYSE:GM").unwrap().unwrap();
        assert_eq!(gm.id, archived.id);

        assert_eq!(count_active(&conn).unwrap(), 3);
    }
}
