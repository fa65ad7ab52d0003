//! Stockwatch - Continuous Stock Monitoring and Alert Engine
//!
//! Watches a persistent list of stock symbols, samples prices on a global
//! tick, evaluates entry zone / take profit / stop loss triggers on price
//! transitions, and fans notifications out to the configured channels.
//! An optional trading-hours gate ties the monitor's lifecycle to an
//! exchange calendar.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod notify;
pub mod price;
pub mod scheduler;

pub use db::MonitorDb;
pub use engine::{EngineState, EngineStatus, MonitorEngine};
pub use error::{AppError, Result};
