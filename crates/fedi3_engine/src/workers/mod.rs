/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Bounded worker pools and the messages they carry.

mod messages;
mod metrics;
mod pool;
mod queue;

pub use messages::{DeliveryMsg, FromClientApi, FromFediApi, Model, WorkerMessage};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use pool::{default_workers, Processor, WorkerPool};
pub use queue::{MessageQueue, Queued};

use anyhow::Result;
use std::sync::Arc;

use crate::config::EngineConfig;

/// The three pools: client-originated, federation-originated and outbound
/// delivery.
pub struct Workers {
    pub client: Arc<WorkerPool<FromClientApi>>,
    pub federator: Arc<WorkerPool<FromFediApi>>,
    pub delivery: Arc<WorkerPool<DeliveryMsg>>,
}

impl Workers {
    pub fn new(cfg: &EngineConfig) -> Self {
        let ratio = cfg.queue_ratio();
        Self {
            client: Arc::new(WorkerPool::new("client", cfg.client_workers(), ratio)),
            federator: Arc::new(WorkerPool::new("federator", cfg.fedi_workers(), ratio)),
            delivery: Arc::new(WorkerPool::new("delivery", cfg.delivery_workers(), ratio)),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.delivery.start()?;
        self.client.start()?;
        self.federator.start()?;
        Ok(())
    }

    /// Stops intake pools first so their last messages can still queue
    /// deliveries.
    pub async fn stop(&self) {
        self.client.stop().await;
        self.federator.stop().await;
        self.delivery.stop().await;
    }

    /// Drops queued work about any of `ids` from all three pools.
    pub fn purge(&self, ids: &[&str]) -> usize {
        self.delivery.purge(ids) + self.client.purge(ids) + self.federator.purge(ids)
    }

    pub fn metrics_json(&self) -> serde_json::Value {
        serde_json::json!([
            self.client.metrics_json(),
            self.federator.metrics_json(),
            self.delivery.metrics_json(),
        ])
    }
}
