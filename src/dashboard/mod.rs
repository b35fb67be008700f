//! Dashboard Module
//!
//! Provides HTTP/WebSocket API for real-time monitoring of SimBot.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;
mod websocket;

pub use api::create_router;
pub use types::*;
pub use websocket::WebSocketBroadcaster;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::DashboardConfig;
use crate::driver::DriverHandle;

/// Forward driver publications to WebSocket clients, plus a heartbeat every
/// `heartbeat` when one is given
pub fn spawn_bridge(
    handle: DriverHandle,
    broadcaster: WebSocketBroadcaster,
    heartbeat: Option<Duration>,
) -> JoinHandle<()> {
    let mut snapshots = handle.snapshots();
    let mut events = handle.subscribe_events();

    tokio::spawn(async move {
        let period = heartbeat.unwrap_or(Duration::from_secs(3600));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick(), if heartbeat.is_some() => broadcaster.broadcast_heartbeat(),
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    broadcaster.broadcast_snapshot(&snapshot);
                }
                event = events.recv() => match event {
                    Ok(event) => broadcaster.broadcast_tick(event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Serve the dashboard until the listener fails
pub async fn serve(config: &DashboardConfig, handle: DriverHandle) -> Result<()> {
    let broadcaster = WebSocketBroadcaster::default();
    let heartbeat =
        (config.heartbeat_secs > 0).then(|| Duration::from_secs(config.heartbeat_secs));
    let _bridge = spawn_bridge(handle.clone(), broadcaster.clone(), heartbeat);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind dashboard on {}", config.bind))?;
    info!(bind = %config.bind, "[DASHBOARD] Listening");

    axum::serve(listener, create_router(handle, broadcaster))
        .await
        .context("Dashboard server failed")
}
