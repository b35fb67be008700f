//! Periodic driver
//!
//! Owns the engine and the current snapshot. A fixed interval triggers ticks;
//! operator commands queue on an mpsc channel and are applied between ticks.
//! Readers get snapshots through a watch channel and per-tick orders/signals
//! through a broadcast channel. Nothing outside the driver mutates state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::engine::{Engine, Snapshot, TickOutput};
use crate::error::EngineError;
use crate::market::CandleSource;
use crate::status::{apply_command, Command};
use crate::types::{Order, Signal, TradingStatus};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 100;

/// What changed in one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickEvent {
    pub tick: u64,
    pub at: DateTime<Utc>,
    pub close: f64,
    pub source: CandleSource,
    pub status: TradingStatus,
    pub new_orders: Vec<Order>,
    pub new_signals: Vec<Signal>,
}

impl TickEvent {
    fn from_output(output: &TickOutput, at: DateTime<Utc>) -> Self {
        Self {
            tick: output.snapshot.tick_count,
            at,
            close: output.price.close,
            source: output.price.source,
            status: output.status,
            new_orders: output.new_orders.clone(),
            new_signals: output.new_signals.clone(),
        }
    }
}

/// Cloneable access for UI code
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    events: broadcast::Sender<TickEvent>,
}

impl DriverHandle {
    /// Queue a command for the next gap between ticks
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Driver is no longer running"))
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TickEvent> {
        self.events.subscribe()
    }
}

pub struct Driver {
    engine: Engine,
    current: Arc<Snapshot>,
    broker: Arc<dyn Broker>,
    tick_interval: Duration,
    commands: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    events: broadcast::Sender<TickEvent>,
}

impl Driver {
    pub fn new(
        engine: Engine,
        initial: Snapshot,
        broker: Arc<dyn Broker>,
        tick_interval: Duration,
    ) -> (Self, DriverHandle) {
        let current = Arc::new(initial);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(current.clone());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let handle = DriverHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: events.clone(),
        };
        let driver = Self {
            engine,
            current,
            broker,
            tick_interval,
            commands: command_rx,
            snapshot_tx,
            events,
        };
        (driver, handle)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Apply an operator command and publish the result
    pub fn handle_command(&mut self, command: Command) {
        if apply_command(Arc::make_mut(&mut self.current), command) {
            self.publish();
        }
    }

    /// Run one tick against the current snapshot.
    ///
    /// On failure the current snapshot stays as it was.
    pub async fn step(&mut self, now: DateTime<Utc>) -> Result<TickEvent, EngineError> {
        let input = Snapshot::clone(&self.current);
        let output = self.engine.tick(input, now).await.map_err(|f| f.error)?;

        let event = TickEvent::from_output(&output, now);
        self.current = Arc::new(output.snapshot);
        self.publish();
        // No receivers is fine
        let _ = self.events.send(event.clone());

        for order in &event.new_orders {
            if let Err(e) = self.broker.place_order(order).await {
                warn!(
                    broker = self.broker.name(),
                    error = %e,
                    side = %order.side,
                    "[DRIVER] Broker rejected order; engine state unaffected"
                );
            }
        }
        Ok(event)
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.current.clone());
    }

    /// Tick until `shutdown` resolves or every command sender is dropped.
    /// Returns the final snapshot.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Arc<Snapshot> {
        tokio::pin!(shutdown);

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            broker = self.broker.name(),
            "[DRIVER] Started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("[DRIVER] Shutdown requested");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("[DRIVER] All command senders dropped");
                        break;
                    }
                },
                _ = interval.tick() => {
                    if let Err(e) = self.step(Utc::now()).await {
                        error!(error = %e, "[DRIVER] Tick failed; keeping previous snapshot");
                    }
                }
            }
        }

        info!(
            ticks = self.current.tick_count,
            equity = self.current.overview.equity,
            total_pnl = self.current.overview.total_pnl,
            "[DRIVER] Stopped"
        );
        self.current
    }
}
