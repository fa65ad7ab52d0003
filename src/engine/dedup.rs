//! Notification dedup cache
//!
//! Edge-triggered evaluation already prevents repeat firings while a
//! condition merely persists, but that relies on the previous price being
//! available. This cache is the backstop for the cases where it is not
//! (first observation of a new item, data cleared between runs): a
//! (item, kind) pair that has been notified stays suppressed until the
//! price returns to the non-triggering side of the bound.

use dashmap::DashMap;

use crate::db::models::TriggerKind;
use crate::engine::trigger::{still_satisfied, TriggerBounds};

const KINDS: [TriggerKind; 3] = [
    TriggerKind::EntryZone,
    TriggerKind::TakeProfit,
    TriggerKind::StopLoss,
];

/// Tracks which (item, kind) pairs have an outstanding notification.
/// The stored value is the price at notification time.
#[derive(Debug, Default)]
pub struct DedupCache {
    fired: DashMap<(i64, TriggerKind), f64>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self {
            fired: DashMap::new(),
        }
    }

    /// True if this (item, kind) has no outstanding notification
    pub fn should_notify(&self, item_id: i64, kind: TriggerKind) -> bool {
        !self.fired.contains_key(&(item_id, kind))
    }

    pub fn mark_notified(&self, item_id: i64, kind: TriggerKind, price: f64) {
        self.fired.insert((item_id, kind), price);
    }

    /// Re-arm every kind whose condition no longer holds at `price`.
    ///
    /// Called with the freshly observed price before evaluation, so an
    /// entry survives exactly as long as the condition it notified for.
    pub fn clear_resolved(&self, item_id: i64, bounds: &TriggerBounds, price: f64) {
        for kind in KINDS {
            if !still_satisfied(bounds, kind, price) {
                self.fired.remove(&(item_id, kind));
            }
        }
    }

    pub fn clear(&self) {
        self.fired.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.fired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_suppresses_until_resolved() {
        let cache = DedupCache::new();
        let bounds = TriggerBounds {
            stop_loss: Some(8.0),
            ..Default::default()
        };

        assert!(cache.should_notify(1, TriggerKind::StopLoss));
        cache.mark_notified(1, TriggerKind::StopLoss, 7.0);
        assert!(!cache.should_notify(1, TriggerKind::StopLoss));

        // Price still at or below the stop: entry stays
        cache.clear_resolved(1, &bounds, 6.5);
        assert!(!cache.should_notify(1, TriggerKind::StopLoss));

        // Price recovers above the stop: re-armed
        cache.clear_resolved(1, &bounds, 8.5);
        assert!(cache.should_notify(1, TriggerKind::StopLoss));
    }

    #[test]
    fn test_clear_resolved_is_per_kind() {
        let cache = DedupCache::new();
        let bounds = TriggerBounds {
            entry_min: Some(10.0),
            entry_max: Some(12.0),
            take_profit: Some(11.0),
            ..Default::default()
        };

        cache.mark_notified(1, TriggerKind::EntryZone, 11.0);
        cache.mark_notified(1, TriggerKind::TakeProfit, 11.0);

        // 13.0 left the entry zone but still satisfies take-profit
        cache.clear_resolved(1, &bounds, 13.0);
        assert!(cache.should_notify(1, TriggerKind::EntryZone));
        assert!(!cache.should_notify(1, TriggerKind::TakeProfit));
    }

    #[test]
    fn test_cleared_bound_resolves_entry() {
        let cache = DedupCache::new();
        cache.mark_notified(1, TriggerKind::TakeProfit, 25.0);

        // Operator removed the bound after the notification
        cache.clear_resolved(1, &TriggerBounds::default(), 25.0);
        assert!(cache.should_notify(1, TriggerKind::TakeProfit));
    }

    #[test]
    fn test_items_are_independent() {
        let cache = DedupCache::new();
        cache.mark_notified(1, TriggerKind::EntryZone, 11.0);
        assert!(cache.should_notify(2, TriggerKind::EntryZone));
        assert!(!cache.should_notify(1, TriggerKind::EntryZone));
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = DedupCache::new();
        cache.mark_notified(1, TriggerKind::EntryZone, 11.0);
        cache.mark_notified(2, TriggerKind::StopLoss, 7.0);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.should_notify(1, TriggerKind::EntryZone));
    }
}
