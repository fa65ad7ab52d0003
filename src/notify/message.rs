//! Notification message formatting

use crate::db::models::{TriggerKind, WatchItem};

/// Rendered subject and body for an outbound notification
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub subject: String,
    pub body: String,
}

fn headline(kind: TriggerKind) -> &'static str {
    match kind {
        TriggerKind::EntryZone => "Entry zone reached",
        TriggerKind::TakeProfit => "Take profit hit",
        TriggerKind::StopLoss => "Stop loss hit",
    }
}

/// Render the message for a fired trigger
pub fn build_message(item: &WatchItem, kind: TriggerKind, price: f64) -> ChannelMessage {
    let name = if item.display_name.is_empty() || item.display_name == item.symbol {
        item.symbol.clone()
    } else {
        format!("{} ({})", item.symbol, item.display_name)
    };

    let detail = match kind {
        TriggerKind::EntryZone => match (item.entry_min, item.entry_max) {
            (Some(min), Some(max)) => format!("Entry zone: {:.2} - {:.2}", min, max),
            _ => String::new(),
        },
        TriggerKind::TakeProfit => item
            .take_profit
            .map(|tp| format!("Take profit: {:.2}", tp))
            .unwrap_or_default(),
        TriggerKind::StopLoss => item
            .stop_loss
            .map(|sl| format!("Stop loss: {:.2}", sl))
            .unwrap_or_default(),
    };

    let subject = format!("{}: {} at {:.2}", headline(kind), item.symbol, price);

    let mut body = format!("{} is trading at {:.2}.", name, price);
    if !detail.is_empty() {
        body.push('\n');
        body.push_str(&detail);
    }
    body.push('\n');
    body.push_str(&format!("Rating: {}", item.rating.as_str()));

    ChannelMessage { subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Rating;

    fn item() -> WatchItem {
        WatchItem {
            id: 1,
            symbol: "AAPL".to_string(),
            display_name: "Apple Inc.".to_string(),
            rating: Rating::Buy,
            entry_min: Some(10.0),
            entry_max: Some(12.0),
            take_profit: Some(20.0),
            stop_loss: Some(8.0),
            check_interval_seconds: 60,
            notifications_enabled: true,
            active: true,
            last_checked_at: None,
            last_price: None,
            created_at: "2026-01-05 09:00:00".to_string(),
        }
    }

    #[test]
    fn test_entry_zone_message() {
        let msg = build_message(&item(), TriggerKind::EntryZone, 11.0);
        assert_eq!(msg.subject, "Entry zone reached: AAPL at 11.00");
        assert!(msg.body.contains("AAPL (Apple Inc.) is trading at 11.00."));
        assert!(msg.body.contains("Entry zone: 10.00 - 12.00"));
        assert!(msg.body.contains("Rating: BUY"));
    }

    #[test]
    fn test_stop_loss_message() {
        let msg = build_message(&item(), TriggerKind::StopLoss, 7.5);
        assert_eq!(msg.subject, "Stop loss hit: AAPL at 7.50");
        assert!(msg.body.contains("Stop loss: 8.00"));
    }

    #[test]
    fn test_plain_name_when_display_name_matches_symbol() {
        let mut i = item();
        i.display_name = "AAPL".to_string();
        let msg = build_message(&i, TriggerKind::TakeProfit, 20.5);
        assert!(msg.body.starts_with("AAPL is trading at 20.50."));
        assert!(msg.body.contains("Take profit: 20.00"));
    }

    #[test]
    fn test_missing_bound_detail_is_omitted() {
        let mut i = item();
        i.take_profit = None;
        let msg = build_message(&i, TriggerKind::TakeProfit, 20.5);
        assert!(!msg.body.contains("Take profit:"));
        assert!(msg.body.contains("Rating: BUY"));
    }
}
