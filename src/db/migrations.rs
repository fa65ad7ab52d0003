//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_watch_items", CREATE_WATCH_ITEMS_TABLE)?;
    run_migration(conn, "002_price_samples", CREATE_PRICE_SAMPLES_TABLE)?;
    run_migration(conn, "003_notifications", CREATE_NOTIFICATIONS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_WATCH_ITEMS_TABLE: &str = r#"
CREATE TABLE watch_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    display_name TEXT NOT NULL,
    rating TEXT NOT NULL DEFAULT 'HOLD',
    entry_min REAL,
    entry_max REAL,
    take_profit REAL,
    stop_loss REAL,
    check_interval_seconds INTEGER NOT NULL DEFAULT 60,
    notifications_enabled INTEGER NOT NULL DEFAULT 1,
    active INTEGER NOT NULL DEFAULT 1,
    last_checked_at TEXT,
    last_price REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_watch_items_active ON watch_items(active);
CREATE INDEX IF NOT EXISTS idx_watch_items_symbol ON watch_items(symbol);
"#;

const CREATE_PRICE_SAMPLES_TABLE: &str = r#"
CREATE TABLE price_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watch_item_id INTEGER NOT NULL REFERENCES watch_items(id) ON DELETE CASCADE,
    price REAL NOT NULL,
    observed_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_price_samples_item ON price_samples(watch_item_id);
CREATE INDEX IF NOT EXISTS idx_price_samples_observed ON price_samples(observed_at);
"#;

const CREATE_NOTIFICATIONS_TABLE: &str = r#"
CREATE TABLE notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watch_item_id INTEGER NOT NULL REFERENCES watch_items(id) ON DELETE CASCADE,
    trigger_kind TEXT NOT NULL,
    price_at_trigger REAL NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    delivered_channels TEXT NOT NULL DEFAULT '[]',
    read INTEGER NOT NULL DEFAULT 0,
    delivery_error TEXT
);
CREATE INDEX IF NOT EXISTS idx_notifications_item ON notifications(watch_item_id);
CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications(read);
"#;
