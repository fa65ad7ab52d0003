//! Database models

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format used throughout the database.
///
/// Matches SQLite's own datetime('now') output so stored values stay
/// comparable in SQL regardless of whether they were written from Rust
/// or by a column default. Always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp for storage
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Current time formatted for storage
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp; returns None on malformed input
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Analyst rating attached to a watch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Buy,
    Hold,
    Sell,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Buy => "BUY",
            Rating::Hold => "HOLD",
            Rating::Sell => "SELL",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Rating::Buy),
            "HOLD" => Ok(Rating::Hold),
            "SELL" => Ok(Rating::Sell),
            other => Err(format!("Unknown rating: {}", other)),
        }
    }
}

/// Kind of trigger condition a price crossing can satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    EntryZone,
    TakeProfit,
    StopLoss,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::EntryZone => "ENTRY_ZONE",
            TriggerKind::TakeProfit => "TAKE_PROFIT",
            TriggerKind::StopLoss => "STOP_LOSS",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ENTRY_ZONE" => Ok(TriggerKind::EntryZone),
            "TAKE_PROFIT" => Ok(TriggerKind::TakeProfit),
            "STOP_LOSS" => Ok(TriggerKind::StopLoss),
            other => Err(format!("Unknown trigger kind: {}", other)),
        }
    }
}

/// Notification delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InApp,
    Email,
}

/// Watch item model: one row per monitored symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchItem {
    pub id: i64,
    /// Exchange-qualified symbol, e.g. "NASDAQ:AAPL"
    pub symbol: String,
    pub display_name: String,
    pub rating: Rating,
    pub entry_min: Option<f64>,
    pub entry_max: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub check_interval_seconds: i64,
    pub notifications_enabled: bool,
    pub active: bool,
    pub last_checked_at: Option<String>,
    pub last_price: Option<f64>,
    pub created_at: String,
}

impl WatchItem {
    /// Whether this item's own interval has elapsed since the last check.
    /// A never-checked item (or one with an unparseable timestamp) is due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at.as_deref().and_then(parse_timestamp) {
            Some(last) => (now - last).num_seconds() >= self.check_interval_seconds,
            None => true,
        }
    }
}

/// Request payload for adding a watch item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWatchItem {
    pub symbol: String,
    pub display_name: String,
    pub rating: Rating,
    pub entry_min: Option<f64>,
    pub entry_max: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub check_interval_seconds: i64,
    pub notifications_enabled: bool,
}

impl NewWatchItem {
    /// Minimal constructor with sensible defaults; bounds set via struct update
    pub fn new(symbol: impl Into<String>, display_name: impl Into<String>, rating: Rating) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            rating,
            entry_min: None,
            entry_max: None,
            take_profit: None,
            stop_loss: None,
            check_interval_seconds: 60,
            notifications_enabled: true,
        }
    }
}

/// Partial update for a watch item.
///
/// Outer None leaves the field untouched; for the price bounds an inner
/// None clears the bound (Some(None) stores NULL).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchItemPatch {
    pub display_name: Option<String>,
    pub rating: Option<Rating>,
    pub entry_min: Option<Option<f64>>,
    pub entry_max: Option<Option<f64>>,
    pub take_profit: Option<Option<f64>>,
    pub stop_loss: Option<Option<f64>>,
    pub check_interval_seconds: Option<i64>,
    pub notifications_enabled: Option<bool>,
}

/// Price sample model: append-only fetch history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    pub id: i64,
    pub watch_item_id: i64,
    pub price: f64,
    pub observed_at: String,
}

/// Notification record model: append-only alert history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub watch_item_id: i64,
    pub trigger_kind: TriggerKind,
    pub price_at_trigger: f64,
    pub created_at: String,
    pub delivered_channels: Vec<Channel>,
    pub read: bool,
    pub delivery_error: Option<String>,
}

/// Payload for persisting a new notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub watch_item_id: i64,
    pub trigger_kind: TriggerKind,
    pub price_at_trigger: f64,
    pub delivered_channels: Vec<Channel>,
    pub delivery_error: Option<String>,
}

/// Result of a batch import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub added: usize,
    pub updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let formatted = format_timestamp(ts);
        assert_eq!(formatted, "2025-03-14 09:26:53");
        assert_eq!(parse_timestamp(&formatted), Some(ts));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_is_due_never_checked() {
        let mut item = test_item();
        item.last_checked_at = None;
        assert!(item.is_due(Utc::now()));
    }

    #[test]
    fn test_is_due_interval_elapsed() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let mut item = test_item();
        item.check_interval_seconds = 60;

        item.last_checked_at = Some("2025-03-14 09:59:30".to_string());
        assert!(!item.is_due(now));

        item.last_checked_at = Some("2025-03-14 09:59:00".to_string());
        assert!(item.is_due(now));

        item.last_checked_at = Some("2025-03-14 09:00:00".to_string());
        assert!(item.is_due(now));
    }

    #[test]
    fn test_trigger_kind_round_trip() {
        for kind in [
            TriggerKind::EntryZone,
            TriggerKind::TakeProfit,
            TriggerKind::StopLoss,
        ] {
            assert_eq!(kind.as_str().parse::<TriggerKind>().unwrap(), kind);
        }
        assert!("SOMETHING_ELSE".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn test_channel_json_names() {
        let channels = vec![Channel::InApp, Channel::Email];
        let json = serde_json::to_string(&channels).unwrap();
        assert_eq!(json, r#"["IN_APP","EMAIL"]"#);
    }

    fn test_item() -> WatchItem {
        WatchItem {
            id: 1,
            symbol: "NASDAQ:AAPL".to_string(),
            display_name: "Apple Inc.".to_string(),
            rating: Rating::Buy,
            entry_min: None,
            entry_max: None,
            take_profit: None,
            stop_loss: None,
            check_interval_seconds: 60,
            notifications_enabled: true,
            active: true,
            last_checked_at: None,
            last_price: None,
            created_at: "2025-03-14 09:00:00".to_string(),
        }
    }
}
