//! Email delivery

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

/// Delivers a rendered message to a mailbox
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Posts messages to an HTTP mail relay.
///
/// The relay accepts `POST {relay_url}` with a JSON body of
/// `{to, subject, body}` and answers 2xx on acceptance.
pub struct HttpRelaySink {
    client: Client,
    relay_url: String,
}

impl HttpRelaySink {
    pub fn new(relay_url: &str, timeout_seconds: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_seconds))
                .build()
                .expect("Failed to create HTTP client"),
            relay_url: relay_url.to_string(),
        }
    }
}

#[async_trait]
impl EmailSink for HttpRelaySink {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        #[derive(Serialize)]
        struct RelayRequest<'a> {
            to: &'a str,
            subject: &'a str,
            body: &'a str,
        }

        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayRequest { to, subject, body })
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("mail relay: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "mail relay returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
