//! Broker adapter boundary
//!
//! The engine fills its own orders. Forwarding them to a broker is a side
//! effect of the driver and never feeds back into engine state.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::BrokerConfig;
use crate::types::Order;

#[async_trait]
pub trait Broker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn place_order(&self, order: &Order) -> Result<()>;
}

/// Logs every order and accepts it
#[derive(Debug, Default)]
pub struct PaperBroker {
    placed: AtomicU64,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placed(&self) -> u64 {
        self.placed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn place_order(&self, order: &Order) -> Result<()> {
        let n = self.placed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            broker = "paper",
            n = n,
            side = %order.side,
            symbol = %order.symbol,
            quantity = order.quantity,
            price = order.price,
            "[BROKER] Order placed"
        );
        Ok(())
    }
}

/// Discards orders
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBroker;

#[async_trait]
impl Broker for DisabledBroker {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn place_order(&self, order: &Order) -> Result<()> {
        debug!(side = %order.side, price = order.price, "[BROKER] Disabled, order dropped");
        Ok(())
    }
}

pub fn build_broker(config: &BrokerConfig) -> Result<Arc<dyn Broker>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledBroker));
    }
    match config.name.as_str() {
        "paper" => Ok(Arc::new(PaperBroker::new())),
        other => bail!("Unknown broker adapter: {}", other),
    }
}
