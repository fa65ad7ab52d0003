//! Notification dispatch
//!
//! Fans a fired trigger out to the configured channels and persists the
//! record. A channel that fails is recorded on the notification, never
//! raised; only a failure to persist the record itself is an error.

pub mod email;
pub mod message;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::db::models::{Channel, NewNotification, NotificationRecord, TriggerKind, WatchItem};
use crate::db::MonitorDb;
use crate::error::Result;

pub use email::{EmailSink, HttpRelaySink};
pub use message::{build_message, ChannelMessage};

/// Routes fired triggers to notification channels
pub struct Dispatcher {
    db: Arc<MonitorDb>,
    email: Option<Arc<dyn EmailSink>>,
    email_config: EmailConfig,
}

impl Dispatcher {
    pub fn new(
        db: Arc<MonitorDb>,
        email_config: EmailConfig,
        email: Option<Arc<dyn EmailSink>>,
    ) -> Self {
        Self {
            db,
            email,
            email_config,
        }
    }

    /// Dispatcher with no outbound channels configured
    pub fn in_app_only(db: Arc<MonitorDb>) -> Self {
        Self {
            db,
            email: None,
            email_config: EmailConfig::default(),
        }
    }

    /// Deliver a fired trigger and persist its notification record.
    ///
    /// The persisted record is itself the in-app channel, so IN_APP is
    /// always listed as delivered. Email is attempted when configured;
    /// a send failure lands in `delivery_error` on the record.
    pub async fn dispatch(
        &self,
        item: &WatchItem,
        kind: TriggerKind,
        price: f64,
    ) -> Result<NotificationRecord> {
        let msg = message::build_message(item, kind, price);

        let mut channels = vec![Channel::InApp];
        let mut delivery_error = None;

        if self.email_config.is_active() {
            if let (Some(sink), Some(recipient)) =
                (&self.email, self.email_config.recipient.as_deref())
            {
                match sink.send(recipient, &msg.subject, &msg.body).await {
                    Ok(()) => channels.push(Channel::Email),
                    Err(e) => {
                        warn!("Email delivery failed for {} {}: {}", item.symbol, kind, e);
                        delivery_error = Some(e.to_string());
                    }
                }
            }
        }

        let record = self.db.record_notification(&NewNotification {
            watch_item_id: item.id,
            trigger_kind: kind,
            price_at_trigger: price,
            delivered_channels: channels,
            delivery_error,
        })?;

        info!(
            "Notification {} for {}: {} at {:.2}",
            record.id, item.symbol, kind, price
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewWatchItem, Rating};
    use crate::error::AppError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmailSink for RecordingSink {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EmailSink for FailingSink {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
            Err(AppError::Delivery("mail relay returned 502".to_string()))
        }
    }

    fn setup() -> (Arc<MonitorDb>, WatchItem) {
        let db = Arc::new(MonitorDb::open_in_memory().unwrap());
        let item = db
            .add_item(&NewWatchItem {
                stop_loss: Some(8.0),
                ..NewWatchItem::new("AAPL", "Apple Inc.", Rating::Buy)
            })
            .unwrap();
        (db, item)
    }

    fn active_email_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            relay_url: Some("http://localhost:9/send".to_string()),
            recipient: Some("ops@example.com".to_string()),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_dispatch_persists_in_app_record() {
        let (db, item) = setup();
        let dispatcher = Dispatcher::in_app_only(db.clone());

        let record = dispatcher
            .dispatch(&item, TriggerKind::StopLoss, 7.5)
            .await
            .unwrap();

        assert_eq!(record.watch_item_id, item.id);
        assert_eq!(record.trigger_kind, TriggerKind::StopLoss);
        assert_eq!(record.price_at_trigger, 7.5);
        assert_eq!(record.delivered_channels, vec![Channel::InApp]);
        assert!(record.delivery_error.is_none());

        let latest = db.latest_notification(item.id).unwrap().unwrap();
        assert_eq!(latest.id, record.id);
    }

    #[tokio::test]
    async fn test_dispatch_sends_email_when_active() {
        let (db, item) = setup();
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(db, active_email_config(), Some(sink.clone()));

        let record = dispatcher
            .dispatch(&item, TriggerKind::StopLoss, 7.5)
            .await
            .unwrap();

        assert_eq!(
            record.delivered_channels,
            vec![Channel::InApp, Channel::Email]
        );

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@example.com");
        assert!(sent[0].1.contains("AAPL"));
        assert!(sent[0].2.contains("Stop loss: 8.00"));
    }

    #[tokio::test]
    async fn test_email_failure_recorded_not_raised() {
        let (db, item) = setup();
        let dispatcher = Dispatcher::new(db.clone(), active_email_config(), Some(Arc::new(FailingSink)));

        let record = dispatcher
            .dispatch(&item, TriggerKind::StopLoss, 7.5)
            .await
            .unwrap();

        assert_eq!(record.delivered_channels, vec![Channel::InApp]);
        assert!(record
            .delivery_error
            .as_deref()
            .unwrap()
            .contains("mail relay returned 502"));

        // The failure is on the record in storage too
        let latest = db.latest_notification(item.id).unwrap().unwrap();
        assert!(latest.delivery_error.is_some());
    }

    #[tokio::test]
    async fn test_email_skipped_when_config_inactive() {
        let (db, item) = setup();
        let sink = Arc::new(RecordingSink::new());
        let config = EmailConfig {
            enabled: false,
            ..active_email_config()
        };
        let dispatcher = Dispatcher::new(db, config, Some(sink.clone()));

        let record = dispatcher
            .dispatch(&item, TriggerKind::StopLoss, 7.5)
            .await
            .unwrap();

        assert_eq!(record.delivered_channels, vec![Channel::InApp]);
        assert!(sink.sent.lock().is_empty());
    }
}
