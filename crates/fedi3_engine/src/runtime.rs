/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! The running engine: caches, worker pools and the processor wired
//! together.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cache::Caches;
use crate::config::EngineConfig;
use crate::db::Db;
use crate::delivery::{Deliverer, HttpDelivery};
use crate::error::Error;
use crate::federation::Dereferencer;
use crate::outbox::DeliveryOutbox;
use crate::processing::{Processor, ProcessorParts};
use crate::social_db::SocialDb;
use crate::storage::Storage;
use crate::stream::{StreamEvent, Streams};
use crate::workers::{DeliveryMsg, FromClientApi, FromFediApi, Workers};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .try_init()
        .ok();
}

struct Pruner {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct Engine {
    caches: Arc<Caches>,
    workers: Arc<Workers>,
    processor: Arc<Processor>,
    pruner: Mutex<Option<Pruner>>,
}

impl Engine {
    /// Builds and starts everything. Must run inside a Tokio runtime.
    pub async fn start(
        cfg: &EngineConfig,
        storage: Arc<dyn Storage>,
        dereferencer: Arc<dyn Dereferencer>,
        deliverer: Arc<dyn Deliverer>,
    ) -> Result<Self> {
        init_tracing();

        let caches = Arc::new(Caches::new(cfg.cache_settings()));
        caches.start_sweeper(cfg.cache_sweep_interval());
        let db = Db::new(storage, caches.clone());
        let workers = Arc::new(Workers::new(cfg));
        let outbox = Arc::new(DeliveryOutbox::new(db.clone(), workers.delivery.clone()));
        let processor = Arc::new(Processor::new(
            cfg,
            ProcessorParts {
                db,
                workers: workers.clone(),
                dereferencer,
                outbox,
                streams: Streams::default(),
            },
        ));

        // The processor owns the pools; the pools only see it weakly.
        let weak = Arc::downgrade(&processor);
        workers.client.set_processor(move |cancel, msg: FromClientApi| {
            let p = weak.upgrade();
            async move {
                match p {
                    Some(p) => p.process_from_client_api(cancel, msg).await,
                    None => Err(Error::QueueClosed.into()),
                }
            }
        });
        let weak = Arc::downgrade(&processor);
        workers.federator.set_processor(move |cancel, msg: FromFediApi| {
            let p = weak.upgrade();
            async move {
                match p {
                    Some(p) => p.process_from_fedi_api(cancel, msg).await,
                    None => Err(Error::QueueClosed.into()),
                }
            }
        });
        let sender = deliverer.clone();
        workers.delivery.set_processor(move |cancel, msg: DeliveryMsg| {
            let deliverer = sender.clone();
            async move { deliverer.deliver(&cancel, &msg).await }
        });

        if let Err(e) = workers.start() {
            caches.stop_sweeper().await;
            return Err(e.context("start worker pools"));
        }

        let engine = Self {
            caches,
            workers,
            processor,
            pruner: Mutex::new(None),
        };
        engine.start_pruner(cfg, deliverer);
        info!(host = %cfg.host(), "engine started");
        Ok(engine)
    }

    /// Starts over the SQLite store at `cfg.db_path()`, delivering over
    /// HTTP.
    pub async fn start_sqlite(cfg: &EngineConfig, dereferencer: Arc<dyn Dereferencer>) -> Result<Self> {
        let path = cfg.db_path();
        let store = tokio::task::spawn_blocking(move || SocialDb::open(path))
            .await
            .context("open db task")??;
        let deliverer = HttpDelivery::new(cfg)?;
        Self::start(cfg, Arc::new(store), dereferencer, Arc::new(deliverer)).await
    }

    /// Periodically trims timelines and idle delivery state.
    fn start_pruner(&self, cfg: &EngineConfig, deliverer: Arc<dyn Deliverer>) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let processor = Arc::downgrade(&self.processor);
        let interval = cfg.cache_sweep_interval();
        let join = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(p) = processor.upgrade() else { break };
                        let n = p.prune_timelines();
                        if n > 0 {
                            debug!(pruned = n, "timeline prune");
                        }
                        let hosts = deliverer.prune();
                        if hosts > 0 {
                            debug!(hosts, "idle delivery hosts pruned");
                        }
                    }
                }
            }
        });
        *self.pruner.lock().unwrap_or_else(PoisonError::into_inner) = Some(Pruner { cancel, join });
    }

    /// Stops the pools, letting in-flight messages finish, then the
    /// background sweeps.
    pub async fn stop(&self) {
        self.workers.stop().await;
        let pruner = self.pruner.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(p) = pruner {
            p.cancel.cancel();
            let _ = p.join.await;
        }
        self.caches.stop_sweeper().await;
        info!("engine stopped");
    }

    pub async fn process_from_client_api(&self, cancel: CancellationToken, msg: FromClientApi) -> Result<()> {
        self.workers.client.queue(cancel, msg).await
    }

    pub async fn process_from_fedi_api(&self, cancel: CancellationToken, msg: FromFediApi) -> Result<()> {
        self.workers.federator.queue(cancel, msg).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.processor.streams().subscribe()
    }

    /// Read paths and direct storage access.
    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }

    pub fn db(&self) -> &Db {
        self.processor.db()
    }

    pub fn metrics_json(&self) -> serde_json::Value {
        serde_json::json!({
            "pools": self.workers.metrics_json(),
            "cache_evictions": self.caches.evictions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fedi3_protocol::{ActivityType, ObjectType};
    use std::time::Duration;

    use crate::stream::StreamKind;
    use crate::testutil::{db_over, follow, local_account, new_status, remote_account, test_store, FakeDereferencer};
    use crate::workers::Model;

    #[derive(Default)]
    struct Inboxes(Mutex<Vec<String>>);

    #[async_trait]
    impl Deliverer for Inboxes {
        async fn deliver(&self, _cancel: &CancellationToken, msg: &DeliveryMsg) -> Result<()> {
            self.0.lock().unwrap().push(msg.inbox.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn queued_status_is_processed_and_delivered() {
        let (store, _dir) = test_store();
        let fixtures = db_over(store.clone());
        let me = Arc::new(local_account(&fixtures, "me").await);
        let fan = remote_account(&fixtures, "fan", "remote.test").await;
        follow(&fixtures, &fan, &me).await;

        let cfg = EngineConfig {
            client_workers: Some(1),
            fedi_workers: Some(1),
            delivery_workers: Some(1),
            ..Default::default()
        };
        let inboxes = Arc::new(Inboxes::default());
        let engine = Engine::start(
            &cfg,
            store,
            Arc::new(FakeDereferencer::new(fixtures.clone())),
            inboxes.clone(),
        )
        .await
        .unwrap();
        let mut events = engine.subscribe();

        let status = new_status(&me);
        engine.db().put_status(&status).await.unwrap();
        let msg = FromClientApi::new(ActivityType::Create, ObjectType::Note, me.clone())
            .with_model(Model::Status(Box::new(status.clone())));
        engine
            .process_from_client_api(CancellationToken::new(), msg)
            .await
            .unwrap();

        let ev = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, StreamKind::Update);
        assert_eq!(ev.id, status.id);

        for _ in 0..200 {
            if !inboxes.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*inboxes.0.lock().unwrap(), vec![fan.inbox_uri.clone()]);

        engine.stop().await;
        let metrics = engine.metrics_json();
        assert_eq!(metrics["pools"].as_array().map(Vec::len), Some(3));
    }
}
