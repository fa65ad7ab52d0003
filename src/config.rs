//! Engine configuration
//!
//! All configuration is passed explicitly into constructors. The library
//! never reads environment variables or ambient global state.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monitoring engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global tick in seconds: how often the loop wakes up to scan the
    /// watch list. Per-item cadence is governed by each item's own
    /// `check_interval_seconds`.
    pub tick_seconds: u64,
    /// Per-request bound on price fetches. A source that takes longer
    /// counts as a failed fetch for that item.
    pub fetch_timeout_seconds: u64,
    /// Whether a trigger may fire on an item's very first observed price,
    /// when there is no previous sample to compare against. Defaults to
    /// true so crossings are not silently missed across restarts.
    pub trigger_on_first_sample: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 5,
            fetch_timeout_seconds: 10,
            trigger_on_first_sample: true,
        }
    }
}

/// Email channel configuration
///
/// Delivery goes through an HTTP relay endpoint that accepts a JSON payload
/// of recipient, subject and body. Email stays disabled unless both the
/// flag and the relay URL are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub relay_url: Option<String>,
    pub recipient: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: None,
            recipient: None,
            timeout_seconds: 10,
        }
    }
}

impl EmailConfig {
    /// Email is only attempted when enabled and fully configured
    pub fn is_active(&self) -> bool {
        self.enabled && self.relay_url.is_some() && self.recipient.is_some()
    }
}

/// Supported exchange calendars for the trading-hours gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Cn,
    Us,
    Hk,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Cn => "CN",
            Market::Us => "US",
            Market::Hk => "HK",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Market {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CN" => Ok(Market::Cn),
            "US" => Ok(Market::Us),
            "HK" => Ok(Market::Hk),
            other => Err(AppError::Validation(format!("Unknown market: {}", other))),
        }
    }
}

/// Trading-hours gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingHoursConfig {
    pub enabled: bool,
    pub market: Market,
    /// Stop the engine automatically once the session (plus margin) ends.
    /// When false the gate only ever starts the engine.
    pub auto_stop: bool,
    /// Minutes before the session open at which monitoring may begin.
    pub pre_market_minutes: i64,
    /// Minutes after the session close for which monitoring keeps running.
    pub post_market_minutes: i64,
}

impl Default for TradingHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            market: Market::Us,
            auto_stop: true,
            pre_market_minutes: 15,
            post_market_minutes: 15,
        }
    }
}
