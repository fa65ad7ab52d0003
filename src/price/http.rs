//! HTTP quote endpoint adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::price::PriceSource;

/// Fetches prices from a quote HTTP endpoint.
///
/// Expects `GET {base_url}/quote?symbol=X` to answer with a JSON body
/// containing a `price` field.
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
}

impl HttpPriceSource {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_seconds))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        #[derive(Deserialize)]
        struct QuoteResponse {
            price: Option<f64>,
            message: Option<String>,
        }

        let response = self
            .client
            .get(format!("{}/quote", self.base_url))
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| AppError::PriceUnavailable(format!("{}: {}", symbol, e)))?;

        if !response.status().is_success() {
            return Err(AppError::PriceUnavailable(format!(
                "{}: quote endpoint returned {}",
                symbol,
                response.status()
            )));
        }

        let quote: QuoteResponse = response.json().await.map_err(|e| {
            AppError::PriceUnavailable(format!("{}: invalid quote payload: {}", symbol, e))
        })?;

        match quote.price {
            Some(price) if price.is_finite() && price > 0.0 => Ok(price),
            Some(price) => Err(AppError::PriceUnavailable(format!(
                "{}: rejected quote {}",
                symbol, price
            ))),
            None => Err(AppError::PriceUnavailable(format!(
                "{}: {}",
                symbol,
                quote
                    .message
                    .unwrap_or_else(|| "no price in response".to_string())
            ))),
        }
    }
}
