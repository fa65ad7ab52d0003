//! Trigger evaluation
//!
//! Pure functions mapping a previous/current price pair against an item's
//! configured bounds to the set of newly satisfied trigger kinds. All
//! three kinds are edge-triggered: a kind fires on the transition into its
//! satisfying state, never again while the state merely persists.

use crate::db::models::{TriggerKind, WatchItem};

/// The price bounds a watch item is evaluated against
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerBounds {
    pub entry_min: Option<f64>,
    pub entry_max: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl TriggerBounds {
    pub fn from_item(item: &WatchItem) -> Self {
        Self {
            entry_min: item.entry_min,
            entry_max: item.entry_max,
            take_profit: item.take_profit,
            stop_loss: item.stop_loss,
        }
    }

    /// Entry zone requires both ends; a half-open range is not evaluated
    fn entry_zone(&self) -> Option<(f64, f64)> {
        match (self.entry_min, self.entry_max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Evaluate which trigger kinds newly fire for this price observation.
///
/// `previous` is the price from the item's prior sample, or None for the
/// very first observation. With `fire_on_first` set, a first observation
/// already inside a satisfying state counts as an edge; with it unset,
/// nothing fires until a real transition is seen. A kind whose bound is
/// unset is never evaluated. Multiple kinds may fire at once.
pub fn evaluate(
    bounds: &TriggerBounds,
    previous: Option<f64>,
    current: f64,
    fire_on_first: bool,
) -> Vec<TriggerKind> {
    let mut fired = Vec::new();

    if let Some((min, max)) = bounds.entry_zone() {
        let inside = current >= min && current <= max;
        let was_inside = previous.map(|p| p >= min && p <= max);
        let newly = match was_inside {
            Some(was) => inside && !was,
            None => fire_on_first && inside,
        };
        if newly {
            fired.push(TriggerKind::EntryZone);
        }
    }

    if let Some(tp) = bounds.take_profit {
        let newly = match previous {
            Some(prev) => current >= tp && prev < tp,
            None => fire_on_first && current >= tp,
        };
        if newly {
            fired.push(TriggerKind::TakeProfit);
        }
    }

    if let Some(sl) = bounds.stop_loss {
        let newly = match previous {
            Some(prev) => current <= sl && prev > sl,
            None => fire_on_first && current <= sl,
        };
        if newly {
            fired.push(TriggerKind::StopLoss);
        }
    }

    fired
}

/// Whether the condition for an already-fired kind still holds at `price`.
///
/// Used by the dedup cache to decide when a crossing has resolved: once
/// the price returns to the non-triggering side the kind is re-armed.
pub fn still_satisfied(bounds: &TriggerBounds, kind: TriggerKind, price: f64) -> bool {
    match kind {
        TriggerKind::EntryZone => match bounds.entry_zone() {
            Some((min, max)) => price >= min && price <= max,
            None => false,
        },
        TriggerKind::TakeProfit => match bounds.take_profit {
            Some(tp) => price >= tp,
            None => false,
        },
        TriggerKind::StopLoss => match bounds.stop_loss {
            Some(sl) => price <= sl,
            None => false,
        },
    }
}
