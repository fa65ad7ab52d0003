//! The monitor loop
//!
//! One task per run. Each cycle snapshots the active watch list, checks
//! every item whose own interval has elapsed, and sleeps out the rest of
//! the global tick. Fetches are bounded by the engine's request timeout
//! and failures are contained per item; storage and dispatch persistence
//! failures abort the run.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::db::models::{now_timestamp, WatchItem};
use crate::engine::trigger::{self, TriggerBounds};
use crate::engine::MonitorEngine;
use crate::error::Result;

/// Loop entry point. Runs until stop is requested or a cycle fails.
pub(super) async fn run(engine: Arc<MonitorEngine>, mut stop_rx: watch::Receiver<bool>) {
    debug!("Monitor loop up");

    // A broken store will surface as a fatal cycle error right away
    if let Err(e) = engine.seed_dedup() {
        warn!("Could not seed dedup state: {}", e);
    }

    let fatal = loop {
        let cycle_started = Instant::now();

        match run_cycle(&engine, &stop_rx).await {
            Ok(true) => break None,
            Ok(false) => {
                engine.counters.cycles.fetch_add(1, Ordering::Relaxed);
                *engine.last_cycle_at.write() = Some(now_timestamp());
            }
            Err(e) => break Some(e),
        }

        // Sleep out the remainder of the tick, waking early on stop
        let tick = Duration::from_secs(engine.tick_seconds.load(Ordering::Relaxed));
        let remaining = tick.saturating_sub(cycle_started.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = stop_rx.changed() => break None,
        }
    };

    engine.finish(fatal);
}

/// One pass over the watch list. Returns true if a stop request was seen
/// mid-cycle.
async fn run_cycle(engine: &MonitorEngine, stop_rx: &watch::Receiver<bool>) -> Result<bool> {
    let items = engine.db.list_active()?;
    let now = Utc::now();
    let mut checked = 0usize;

    for item in &items {
        if *stop_rx.borrow() {
            debug!("Stop seen mid-cycle after {} items", checked);
            return Ok(true);
        }
        if !item.is_due(now) {
            continue;
        }

        let price = match engine.fetch_price(&item.symbol).await {
            Ok(p) => p,
            Err(e) => {
                // Contained: the item keeps its previous check state
                engine.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Price fetch failed for {}: {}", item.symbol, e);
                continue;
            }
        };

        observe(engine, item, price).await?;
        checked += 1;
    }

    debug!("Cycle complete: {} of {} items checked", checked, items.len());
    Ok(false)
}

/// Record a fresh observation and dispatch any newly fired triggers.
///
/// Also the workhorse behind manual refresh. Storage and dispatch
/// persistence errors propagate to the caller.
pub(super) async fn observe(engine: &MonitorEngine, item: &WatchItem, price: f64) -> Result<()> {
    let previous = item.last_price;

    engine.db.record_sample(item.id, price, Utc::now())?;
    engine.counters.samples.fetch_add(1, Ordering::Relaxed);

    let bounds = TriggerBounds::from_item(item);
    engine.dedup.clear_resolved(item.id, &bounds, price);

    let fired = trigger::evaluate(
        &bounds,
        previous,
        price,
        engine.config.trigger_on_first_sample,
    );

    for kind in fired {
        if !item.notifications_enabled {
            debug!("{} hit for {} but notifications are off", kind, item.symbol);
            continue;
        }
        if !engine.dedup.should_notify(item.id, kind) {
            debug!("Suppressed duplicate {} for {}", kind, item.symbol);
            continue;
        }

        engine.dispatcher.dispatch(item, kind, price).await?;
        engine.dedup.mark_notified(item.id, kind, price);
        engine.counters.notifications.fetch_add(1, Ordering::Relaxed);
    }

    Ok(())
}
