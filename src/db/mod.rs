//! SQLite-backed watch store
//!
//! `MonitorDb` owns the connection behind a mutex; public methods lock and
//! delegate to the per-table modules. Every public call is atomic: single
//! statements rely on SQLite, multi-statement writes use a transaction.

pub mod models;
mod migrations;
mod notifications;
mod price_samples;
mod watch_items;

use crate::error::Result;
use chrono::{DateTime, Utc};
use models::{
    format_timestamp, BatchOutcome, NewNotification, NewWatchItem, NotificationRecord,
    PriceSample, WatchItem, WatchItemPatch,
};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

pub use watch_items::{clamp_interval, MAX_CHECK_INTERVAL, MIN_CHECK_INTERVAL};

/// SQLite database wrapper
pub struct MonitorDb {
    conn: Mutex<Connection>,
}

impl MonitorDb {
    /// Open (or create) the database at the given path
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for better concurrent access; foreign_keys is off by
        // default and applies per connection
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// In-memory database, used by tests and offline demos
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Watch Item Methods ==========

    /// Add a watch item; fails with `DuplicateSymbol` for an active duplicate
    pub fn add_item(&self, req: &NewWatchItem) -> Result<WatchItem> {
        let conn = self.conn.lock();
        watch_items::add_item(&conn, req)
    }

    /// Get a watch item by id
    pub fn get_item(&self, id: i64) -> Result<Option<WatchItem>> {
        let conn = self.conn.lock();
        watch_items::get_item(&conn, id)
    }

    /// Get the active watch item for a symbol
    pub fn get_by_symbol(&self, symbol: &str) -> Result<Option<WatchItem>> {
        let conn = self.conn.lock();
        watch_items::get_by_symbol(&conn, symbol)
    }

    /// Apply a partial update; fails with `NotFound` if absent
    pub fn update_item(&self, id: i64, patch: &WatchItemPatch) -> Result<WatchItem> {
        let conn = self.conn.lock();
        watch_items::update_item(&conn, id, patch)
    }

    /// Mark an item inactive; history is kept
    pub fn remove_item(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        watch_items::remove_item(&conn, id)
    }

    /// Set the active flag directly
    pub fn set_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn.lock();
        watch_items::set_active(&conn, id, active)
    }

    /// Active items in insertion order
    pub fn list_active(&self) -> Result<Vec<WatchItem>> {
        let conn = self.conn.lock();
        watch_items::list_active(&conn)
    }

    /// All items including inactive ones
    pub fn list_all(&self) -> Result<Vec<WatchItem>> {
        let conn = self.conn.lock();
        watch_items::list_all(&conn)
    }

    /// Number of active items
    pub fn count_active(&self) -> Result<i64> {
        let conn = self.conn.lock();
        watch_items::count_active(&conn)
    }

    /// Flip the notifications flag; returns the new state
    pub fn toggle_notifications(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        watch_items::toggle_notifications(&conn, id)
    }

    /// Import a batch of items in one transaction
    pub fn batch_upsert(&self, items: &[NewWatchItem]) -> Result<BatchOutcome> {
        let mut conn = self.conn.lock();
        watch_items::batch_upsert(&mut conn, items)
    }

    // ========== Price Sample Methods ==========

    /// Record a successful price fetch: appends the sample and updates the
    /// item's `last_price`/`last_checked_at` in one transaction.
    pub fn record_sample(
        &self,
        watch_item_id: i64,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let ts = format_timestamp(observed_at);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = price_samples::insert_sample(&tx, watch_item_id, price, &ts)?;
        watch_items::touch_check(&tx, watch_item_id, price, &ts)?;
        tx.commit()?;
        Ok(id)
    }

    /// Most recent samples for an item, newest first
    pub fn recent_samples(&self, watch_item_id: i64, limit: usize) -> Result<Vec<PriceSample>> {
        let conn = self.conn.lock();
        price_samples::recent_samples(&conn, watch_item_id, limit)
    }

    /// Latest sample for an item
    pub fn latest_sample(&self, watch_item_id: i64) -> Result<Option<PriceSample>> {
        let conn = self.conn.lock();
        price_samples::latest_sample(&conn, watch_item_id)
    }

    /// Total samples stored for an item
    pub fn count_samples(&self, watch_item_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        price_samples::count_samples(&conn, watch_item_id)
    }

    /// Drop samples older than the given number of days
    pub fn purge_samples_older_than(&self, days: u32) -> Result<usize> {
        let conn = self.conn.lock();
        price_samples::purge_older_than(&conn, days)
    }

    // ========== Notification Methods ==========

    /// Persist a notification; assigns id and timestamp
    pub fn record_notification(&self, new: &NewNotification) -> Result<NotificationRecord> {
        let conn = self.conn.lock();
        notifications::insert_notification(&conn, new)
    }

    /// Latest notification for an item; rebuilds dedup state after restart
    pub fn latest_notification(&self, watch_item_id: i64) -> Result<Option<NotificationRecord>> {
        let conn = self.conn.lock();
        notifications::latest_notification(&conn, watch_item_id)
    }

    /// Most recent notifications across all items
    pub fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock();
        notifications::recent_notifications(&conn, limit)
    }

    /// Unread notifications, oldest first
    pub fn unread_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock();
        notifications::unread_notifications(&conn)
    }

    /// Count unread notifications
    pub fn count_unread(&self) -> Result<i64> {
        let conn = self.conn.lock();
        notifications::count_unread(&conn)
    }

    /// Mark one notification read
    pub fn mark_notification_read(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        notifications::mark_read(&conn, id)
    }

    /// Mark all notifications read
    pub fn mark_all_notifications_read(&self) -> Result<usize> {
        let conn = self.conn.lock();
        notifications::mark_all_read(&conn)
    }

    /// Delete the entire notification history
    pub fn clear_notifications(&self) -> Result<usize> {
        let conn = self.conn.lock();
        notifications::clear_all(&conn)
    }
}
