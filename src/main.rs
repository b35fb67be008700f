//! SimBot - simulated intraday market + trading engine
//!
//! Loads config, seeds the first snapshot and runs the tick driver until
//! Ctrl-C. With the `dashboard` feature the HTTP/WebSocket API runs alongside.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use simbot::broker::build_broker;
use simbot::config::{AppConfig, LoggingConfig};
use simbot::driver::Driver;
use simbot::market::build_forecaster;
use simbot::Engine;

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("========================================");
    info!("SimBot v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!(config = %config.digest(), "Configuration loaded");

    let forecaster = build_forecaster(&config.forecast)?;
    let broker = build_broker(&config.broker)?;
    info!(forecaster = forecaster.name(), broker = broker.name(), "Adapters ready");

    let tick_interval = Duration::from_millis(config.engine.tick_interval_ms);
    #[cfg(feature = "dashboard")]
    let dashboard_config = config.dashboard.clone();

    let mut engine = Engine::new(config, forecaster);
    let snapshot = engine.initial_snapshot(Utc::now());
    info!(
        candles = snapshot.candles.len(),
        price = snapshot.last_price().unwrap_or_default(),
        equity = snapshot.overview.equity,
        "Initial snapshot seeded"
    );

    let (driver, handle) = Driver::new(engine, snapshot, broker, tick_interval);

    #[cfg(feature = "dashboard")]
    {
        let dashboard_handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = simbot::dashboard::serve(&dashboard_config, dashboard_handle).await {
                error!(error = %e, "Dashboard stopped");
            }
        });
    }

    // Keep the command channel open for the driver's lifetime
    let _handle = handle;

    let final_snapshot = driver.run(shutdown_signal()).await;
    info!(
        ticks = final_snapshot.tick_count,
        equity = final_snapshot.overview.equity,
        total_pnl = final_snapshot.overview.total_pnl,
        max_drawdown = final_snapshot.overview.max_drawdown,
        open_positions = final_snapshot.positions.len(),
        "SimBot stopped"
    );
    Ok(())
}
