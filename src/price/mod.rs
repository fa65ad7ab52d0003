//! Price source adapters

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{AppError, Result};

pub use http::HttpPriceSource;

/// A source of current prices for watched symbols
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// Fetch the current price for a symbol.
    ///
    /// Implementations map every failure (transport error, bad payload,
    /// unknown symbol, nonsense quote) to [`AppError::PriceUnavailable`]
    /// so callers can treat fetch failures uniformly.
    async fn get_price(&self, symbol: &str) -> Result<f64>;
}

/// In-memory price table, for offline runs and tests
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<String, f64>>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.write().insert(symbol.to_string(), price);
    }

    pub fn clear_price(&self, symbol: &str) {
        self.prices.write().remove(symbol);
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .read()
            .get(symbol)
            .copied()
            .ok_or_else(|| AppError::PriceUnavailable(format!("No price loaded for {}", symbol)))
    }
}
