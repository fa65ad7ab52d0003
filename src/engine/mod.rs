//! Monitor engine
//!
//! Owns the background monitoring loop and its lifecycle. The engine is
//! shared behind an `Arc`; `start` spawns the loop task, `stop` asks it
//! to wind down cooperatively, and `status` reports a point-in-time
//! snapshot. A crashed loop always lands back in STOPPED with the error
//! preserved, so the hosting process survives and the engine can be
//! restarted.

mod dedup;
mod loop_task;
pub mod trigger;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::db::models::WatchItem;
use crate::db::MonitorDb;
use crate::error::{AppError, Result};
use crate::notify::Dispatcher;
use crate::price::PriceSource;

use dedup::DedupCache;
use trigger::TriggerBounds;

/// Bounds for the global tick interval, in seconds
pub const MIN_TICK_SECONDS: u64 = 1;
pub const MAX_TICK_SECONDS: u64 = 3600;

fn clamp_tick(seconds: u64) -> u64 {
    seconds.clamp(MIN_TICK_SECONDS, MAX_TICK_SECONDS)
}

/// Lifecycle state of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    Stopped,
    Running,
    Stopping,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Stopped => "STOPPED",
            EngineState::Running => "RUNNING",
            EngineState::Stopping => "STOPPING",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time snapshot of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub tick_seconds: u64,
    /// Active items per the store; `None` when the store cannot be read
    pub active_item_count: Option<i64>,
    pub last_cycle_at: Option<String>,
    pub last_error: Option<String>,
    pub stopped_on_error: bool,
    pub cycle_count: u64,
    pub samples_recorded: u64,
    pub fetch_failures: u64,
    pub notifications_sent: u64,
}

/// Cumulative counters for the current run
#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    samples: AtomicU64,
    fetch_failures: AtomicU64,
    notifications: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.notifications.store(0, Ordering::Relaxed);
    }
}

/// Continuous price monitor over the active watch list
pub struct MonitorEngine {
    db: Arc<MonitorDb>,
    source: Arc<dyn PriceSource>,
    dispatcher: Dispatcher,
    config: EngineConfig,
    state: RwLock<EngineState>,
    stop_tx: RwLock<Option<watch::Sender<bool>>>,
    tick_seconds: AtomicU64,
    dedup: DedupCache,
    counters: Counters,
    last_cycle_at: RwLock<Option<String>>,
    last_error: RwLock<Option<String>>,
    stopped_on_error: AtomicBool,
}

impl MonitorEngine {
    pub fn new(
        db: Arc<MonitorDb>,
        source: Arc<dyn PriceSource>,
        dispatcher: Dispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            source,
            dispatcher,
            tick_seconds: AtomicU64::new(clamp_tick(config.tick_seconds)),
            config,
            state: RwLock::new(EngineState::Stopped),
            stop_tx: RwLock::new(None),
            dedup: DedupCache::new(),
            counters: Counters::default(),
            last_cycle_at: RwLock::new(None),
            last_error: RwLock::new(None),
            stopped_on_error: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Control Surface
    // ========================================================================

    /// Start the monitor loop.
    ///
    /// Returns [`AppError::AlreadyRunning`] unless the engine is STOPPED.
    /// Counters and the previous run's error are reset; the first cycle
    /// runs immediately after the loop task comes up.
    pub fn start(self: &Arc<Self>, tick_override: Option<u64>) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != EngineState::Stopped {
                return Err(AppError::AlreadyRunning);
            }
            *state = EngineState::Running;
        }

        if let Some(tick) = tick_override {
            self.tick_seconds.store(clamp_tick(tick), Ordering::Relaxed);
        }

        self.counters.reset();
        *self.last_cycle_at.write() = None;
        *self.last_error.write() = None;
        self.stopped_on_error.store(false, Ordering::Relaxed);

        let (tx, rx) = watch::channel(false);
        *self.stop_tx.write() = Some(tx);

        tokio::spawn(loop_task::run(Arc::clone(self), rx));

        info!(
            "Monitor started (tick {}s)",
            self.tick_seconds.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Ask the loop to stop after the in-flight item, if any.
    ///
    /// Idempotent: stopping a STOPPED or already STOPPING engine is a
    /// no-op. The state moves to STOPPED once the loop has wound down.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.write();
        if *state != EngineState::Running {
            return Ok(());
        }
        *state = EngineState::Stopping;

        if let Some(tx) = self.stop_tx.read().as_ref() {
            let _ = tx.send(true);
        }

        info!("Monitor stop requested");
        Ok(())
    }

    /// Point-in-time snapshot. Always answers: the in-memory state, error
    /// and counters are reported even when the store is broken, with the
    /// store-derived item count degrading to `None`.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: *self.state.read(),
            tick_seconds: self.tick_seconds.load(Ordering::Relaxed),
            active_item_count: self.db.count_active().ok(),
            last_cycle_at: self.last_cycle_at.read().clone(),
            last_error: self.last_error.read().clone(),
            stopped_on_error: self.stopped_on_error.load(Ordering::Relaxed),
            cycle_count: self.counters.cycles.load(Ordering::Relaxed),
            samples_recorded: self.counters.samples.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            notifications_sent: self.counters.notifications.load(Ordering::Relaxed),
        }
    }

    /// Adjust the global tick. Takes effect from the next sleep; returns
    /// the clamped value actually applied.
    pub fn set_global_interval(&self, seconds: u64) -> u64 {
        let clamped = clamp_tick(seconds);
        self.tick_seconds.store(clamped, Ordering::Relaxed);
        info!("Tick interval set to {}s", clamped);
        clamped
    }

    /// Fetch and evaluate one item right now, ignoring its own interval
    /// and whether the loop is running. Unlike the loop, a fetch failure
    /// here is returned to the caller.
    pub async fn refresh_item(&self, item_id: i64) -> Result<WatchItem> {
        let item = self
            .db
            .get_item(item_id)?
            .ok_or_else(|| AppError::NotFound(format!("Watch item {} not found", item_id)))?;

        let price = match self.fetch_price(&item.symbol).await {
            Ok(p) => p,
            Err(e) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        loop_task::observe(self, &item, price).await?;

        self.db
            .get_item(item_id)?
            .ok_or_else(|| AppError::NotFound(format!("Watch item {} not found", item_id)))
    }

    // ========================================================================
    // Loop Support
    // ========================================================================

    /// Fetch one price, bounded by the configured request timeout. A
    /// source that hangs past the bound counts as a failed fetch.
    async fn fetch_price(&self, symbol: &str) -> Result<f64> {
        let limit = Duration::from_secs(self.config.fetch_timeout_seconds);
        match tokio::time::timeout(limit, self.source.get_price(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::PriceUnavailable(format!(
                "{}: no quote within {}s",
                symbol, self.config.fetch_timeout_seconds
            ))),
        }
    }

    /// Rebuild dedup state from storage before a run.
    ///
    /// An item whose most recent notification is for a condition still
    /// satisfied at its last known price stays suppressed, so a restart
    /// does not re-announce an ongoing crossing.
    fn seed_dedup(&self) -> Result<()> {
        self.dedup.clear();

        for item in self.db.list_active()? {
            let record = match self.db.latest_notification(item.id)? {
                Some(r) => r,
                None => continue,
            };
            let last_price = match item.last_price {
                Some(p) => p,
                None => continue,
            };

            let bounds = TriggerBounds::from_item(&item);
            if trigger::still_satisfied(&bounds, record.trigger_kind, last_price) {
                self.dedup
                    .mark_notified(item.id, record.trigger_kind, record.price_at_trigger);
            }
        }

        Ok(())
    }

    /// Loop exit point. Always lands in STOPPED; a fatal error is kept
    /// for `status` and flagged so callers can tell it from a user stop.
    fn finish(&self, fatal: Option<AppError>) {
        if let Some(e) = fatal {
            error!("Monitor stopped on error: {}", e);
            *self.last_error.write() = Some(e.to_string());
            self.stopped_on_error.store(true, Ordering::Relaxed);
        } else {
            info!("Monitor stopped");
        }

        *self.stop_tx.write() = None;
        *self.state.write() = EngineState::Stopped;
    }
}
