//! Scheduled supervision
//!
//! Ties the monitor engine's lifecycle to exchange trading hours.

mod trading_hours;

pub use trading_hours::{is_market_open, GateStatus, TradingHoursGate};
