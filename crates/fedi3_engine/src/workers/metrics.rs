/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct WorkerMetrics {
    pub queued: AtomicU64,
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub panicked: AtomicU64,
    pub purged: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queued: u64,
    pub processed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub purged: u64,
}

impl WorkerMetrics {
    pub fn queued_add(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed_add(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_add(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn panicked_add(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn purged_add(&self, n: u64) {
        self.purged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot_json(&self, pool: &str, backlog: usize) -> serde_json::Value {
        let s = self.snapshot();
        serde_json::json!({
            "pool": pool,
            "backlog": backlog,
            "queued": s.queued,
            "processed": s.processed,
            "failed": s.failed,
            "panicked": s.panicked,
            "purged": s.purged,
        })
    }
}
