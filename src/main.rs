//! stockwatch - continuous stock monitoring from the command line

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockwatch::config::{EmailConfig, EngineConfig, Market, TradingHoursConfig};
use stockwatch::db::MonitorDb;
use stockwatch::engine::{EngineState, MonitorEngine};
use stockwatch::notify::{Dispatcher, EmailSink, HttpRelaySink};
use stockwatch::price::{HttpPriceSource, PriceSource, StaticPriceSource};
use stockwatch::scheduler::TradingHoursGate;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database
    #[arg(long, default_value = "stockwatch.db")]
    db: String,

    /// Global tick in seconds
    #[arg(long, default_value_t = 5)]
    tick: u64,

    /// Base URL of the quote endpoint; omitted, prices come from an
    /// empty in-memory table
    #[arg(long)]
    quote_url: Option<String>,

    /// Per-request price fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    fetch_timeout: u64,

    /// Mail relay endpoint for email notifications
    #[arg(long)]
    email_relay: Option<String>,

    /// Recipient address for email notifications
    #[arg(long)]
    email_to: Option<String>,

    /// Gate monitoring to this market's trading hours (CN, US or HK)
    #[arg(long)]
    market: Option<Market>,

    /// With --market, keep running after the session ends instead of
    /// stopping automatically
    #[arg(long)]
    no_auto_stop: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stockwatch...");

    let db = Arc::new(MonitorDb::new(Path::new(&args.db))?);
    info!("Database ready at {}", args.db);

    let source: Arc<dyn PriceSource> = match &args.quote_url {
        Some(url) => Arc::new(HttpPriceSource::new(url, args.fetch_timeout)),
        None => {
            warn!("No quote URL configured; every price fetch will fail until one is provided");
            Arc::new(StaticPriceSource::new())
        }
    };
    info!("Price source: {}", source.name());

    let email = EmailConfig {
        enabled: args.email_relay.is_some() && args.email_to.is_some(),
        relay_url: args.email_relay.clone(),
        recipient: args.email_to.clone(),
        ..EmailConfig::default()
    };
    if email.is_active() {
        info!("Email notifications enabled via {}", args.email_relay.as_deref().unwrap_or(""));
    }

    let sink = email
        .relay_url
        .as_deref()
        .map(|url| Arc::new(HttpRelaySink::new(url, email.timeout_seconds)) as Arc<dyn EmailSink>);

    let config = EngineConfig {
        tick_seconds: args.tick,
        fetch_timeout_seconds: args.fetch_timeout,
        ..EngineConfig::default()
    };

    let dispatcher = Dispatcher::new(db.clone(), email, sink);
    let engine = Arc::new(MonitorEngine::new(db.clone(), source, dispatcher, config));

    info!("Watching {} active items", db.count_active()?);

    match args.market {
        Some(market) => {
            let gate = TradingHoursGate::new(
                engine.clone(),
                TradingHoursConfig {
                    enabled: true,
                    market,
                    auto_stop: !args.no_auto_stop,
                    ..TradingHoursConfig::default()
                },
            );
            let status = gate.status(Utc::now());
            info!(
                "Trading hours gate enabled for {} (currently {} session)",
                status.market,
                if status.in_session { "in" } else { "out of" }
            );
            gate.start();
        }
        None => engine.start(None)?,
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping monitor...");

    engine.stop()?;
    while engine.status().state != EngineState::Stopped {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    info!("Shutdown complete");
    Ok(())
}
