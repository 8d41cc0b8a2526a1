/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::messages::WorkerMessage;
use super::metrics::{MetricsSnapshot, WorkerMetrics};
use super::queue::{MessageQueue, Queued};

pub type Processor<M> =
    Arc<dyn Fn(CancellationToken, M) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Running {
    stop: CancellationToken,
    joins: Vec<JoinHandle<()>>,
}

/// A fixed number of workers draining one bounded queue through a single
/// processing function.
pub struct WorkerPool<M> {
    name: &'static str,
    workers: usize,
    queue: Arc<MessageQueue<M>>,
    process: OnceLock<Processor<M>>,
    metrics: Arc<WorkerMetrics>,
    running: Mutex<Option<Running>>,
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 4
}

impl<M: WorkerMessage> WorkerPool<M> {
    /// `workers` of 0 means four per available CPU; `queue_ratio` of 0
    /// means a queue 100 times the worker count.
    pub fn new(name: &'static str, workers: usize, queue_ratio: usize) -> Self {
        let workers = if workers == 0 { default_workers() } else { workers };
        let ratio = if queue_ratio == 0 { 100 } else { queue_ratio };
        Self {
            name,
            workers,
            queue: Arc::new(MessageQueue::new(workers.saturating_mul(ratio))),
            process: OnceLock::new(),
            metrics: Arc::new(WorkerMetrics::default()),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Registers the processing function.
    ///
    /// # Panics
    ///
    /// When a processor was already registered.
    pub fn set_processor<F, Fut>(&self, f: F)
    where
        F: Fn(CancellationToken, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let process: Processor<M> = Arc::new(move |cancel, msg| f(cancel, msg).boxed());
        if self.process.set(process).is_err() {
            panic!("worker pool {}: processor already set", self.name);
        }
    }

    pub fn start(&self) -> Result<()> {
        let process = self
            .process
            .get()
            .cloned()
            .ok_or_else(|| anyhow!("worker pool {}: no processor set", self.name))?;

        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Ok(());
        }

        let stop = CancellationToken::new();
        let joins = (0..self.workers)
            .map(|_| {
                tokio::spawn(work(
                    self.name,
                    self.queue.clone(),
                    process.clone(),
                    self.metrics.clone(),
                    stop.clone(),
                ))
            })
            .collect();
        *running = Some(Running { stop, joins });
        info!(pool = self.name, workers = self.workers, capacity = self.queue.capacity(), "worker pool started");
        Ok(())
    }

    /// Stops the workers once their current message is done. Queued
    /// messages stay queued for a later `start`.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };
        running.stop.cancel();
        for j in running.joins {
            let _ = j.await;
        }
        info!(pool = self.name, "worker pool stopped");
    }

    /// Enqueues `msg`, waiting only while the queue is full.
    pub async fn queue(&self, cancel: CancellationToken, msg: M) -> Result<()> {
        self.queue.push(cancel, msg).await?;
        self.metrics.queued_add();
        Ok(())
    }

    /// Drops every queued message whose subjects include one of `ids`.
    pub fn purge(&self, ids: &[&str]) -> usize {
        let ids: Vec<&str> = ids.iter().copied().filter(|s| !s.is_empty()).collect();
        if ids.is_empty() {
            return 0;
        }
        let removed = self
            .queue
            .delete_where(|m| m.subject_ids().iter().any(|s| ids.contains(s)));
        if removed > 0 {
            self.metrics.purged_add(removed as u64);
            debug!(pool = self.name, removed, "purged queued messages");
        }
        removed
    }

    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_json(&self) -> serde_json::Value {
        self.metrics.snapshot_json(self.name, self.queue.len())
    }
}

async fn work<M: WorkerMessage>(
    pool: &'static str,
    queue: Arc<MessageQueue<M>>,
    process: Processor<M>,
    metrics: Arc<WorkerMetrics>,
    stop: CancellationToken,
) {
    while let Some(Queued { cancel, msg }) = queue.pop(&stop).await {
        if cancel.is_cancelled() {
            debug!(pool, msg = %msg, "dropping cancelled message");
            continue;
        }
        let desc = msg.to_string();
        let res = AssertUnwindSafe(async { process(cancel, msg).await })
            .catch_unwind()
            .await;
        match res {
            Ok(Ok(())) => metrics.processed_add(),
            Ok(Err(e)) => {
                metrics.failed_add();
                error!(pool, msg = %desc, "error processing: {e:#}");
            }
            Err(panic) => {
                metrics.panicked_add();
                error!(pool, msg = %desc, "panic processing: {}", panic_message(&*panic));
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
