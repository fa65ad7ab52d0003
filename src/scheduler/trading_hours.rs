//! Trading-hours gate
//!
//! Supervises the monitor engine against an exchange calendar: while
//! enabled, the gate keeps the engine running during the session (plus
//! configured margins) and, with auto_stop, keeps it stopped outside it.
//! Sessions are evaluated in the exchange's own timezone, so daylight
//! saving shifts come from the tz database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Market, TradingHoursConfig};
use crate::engine::{EngineState, MonitorEngine};
use crate::error::AppError;

/// Largest pre/post session margin honored, in minutes
const MAX_MARGIN_MINUTES: i64 = 120;

fn market_timezone(market: Market) -> Tz {
    match market {
        Market::Cn => chrono_tz::Asia::Shanghai,
        Market::Hk => chrono_tz::Asia::Hong_Kong,
        Market::Us => chrono_tz::America::New_York,
    }
}

/// Trading sessions as local wall-clock windows, inclusive on both ends
fn market_sessions(market: Market) -> Vec<(NaiveTime, NaiveTime)> {
    let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    match market {
        Market::Cn => vec![(t(9, 30), t(11, 30)), (t(13, 0), t(15, 0))],
        Market::Hk => vec![(t(9, 30), t(12, 0)), (t(13, 0), t(16, 0))],
        Market::Us => vec![(t(9, 30), t(16, 0))],
    }
}

/// Whether the market is inside a weekday session at `now`, widened by
/// the given margins. Holiday calendars are not consulted.
pub fn is_market_open(
    market: Market,
    now: DateTime<Utc>,
    pre_margin_minutes: i64,
    post_margin_minutes: i64,
) -> bool {
    let local = now.with_timezone(&market_timezone(market));
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let pre = chrono::Duration::minutes(pre_margin_minutes.clamp(0, MAX_MARGIN_MINUTES));
    let post = chrono::Duration::minutes(post_margin_minutes.clamp(0, MAX_MARGIN_MINUTES));
    let time = local.time();

    market_sessions(market)
        .iter()
        .any(|&(open, close)| time >= open - pre && time <= close + post)
}

/// Live view of the gate
#[derive(Debug, Clone, Serialize)]
pub struct GateStatus {
    pub enabled: bool,
    pub market: Market,
    pub in_session: bool,
}

/// Minute-cadence supervisor tying the engine lifecycle to market hours
pub struct TradingHoursGate {
    engine: Arc<MonitorEngine>,
    config: TradingHoursConfig,
}

impl TradingHoursGate {
    pub fn new(engine: Arc<MonitorEngine>, config: TradingHoursConfig) -> Self {
        Self { engine, config }
    }

    pub fn in_session(&self, now: DateTime<Utc>) -> bool {
        is_market_open(
            self.config.market,
            now,
            self.config.pre_market_minutes,
            self.config.post_market_minutes,
        )
    }

    pub fn status(&self, now: DateTime<Utc>) -> GateStatus {
        GateStatus {
            enabled: self.config.enabled,
            market: self.config.market,
            in_session: self.in_session(now),
        }
    }

    /// Apply the policy once. In session the engine is (re)started, which
    /// also recovers from an earlier fatal stop; out of session it is
    /// stopped when auto_stop is set.
    fn apply(&self, now: DateTime<Utc>) {
        if !self.config.enabled {
            return;
        }

        if self.in_session(now) {
            match self.engine.start(None) {
                Ok(()) => info!("{} session open: monitor started", self.config.market),
                Err(AppError::AlreadyRunning) => {}
                Err(e) => warn!("Trading hours gate could not start monitor: {}", e),
            }
        } else if self.config.auto_stop && self.engine.status().state == EngineState::Running {
            let _ = self.engine.stop();
            info!("{} session closed: monitor stopping", self.config.market);
        }
    }

    /// Run the gate on a minute cadence for the life of the process
    pub fn start(self) {
        info!("Trading hours gate started ({})", self.config.market);
        tokio::spawn(async move {
            loop {
                self.apply(Utc::now());
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }
}
