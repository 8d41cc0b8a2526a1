/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fedi3_protocol::ACTIVITY_JSON;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Error;
use crate::http_retry::send_with_retry;
use crate::util::host_from_url;
use crate::workers::DeliveryMsg;

/// Puts one rendered activity into one remote inbox.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, cancel: &CancellationToken, msg: &DeliveryMsg) -> Result<()>;

    /// Drops per-host state nobody is using. Returns how much went.
    fn prune(&self) -> usize {
        0
    }
}

/// Delivers over HTTP with a bounded number of requests in flight per
/// remote host.
pub struct HttpDelivery {
    client: reqwest::Client,
    attempts: u32,
    max_per_host: usize,
    user_agent: String,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpDelivery {
    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.delivery_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            attempts: cfg.delivery_attempts(),
            max_per_host: cfg.delivery_max_per_host(),
            user_agent: cfg.user_agent(),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    fn host_limit(&self, host: &str) -> Arc<Semaphore> {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone()
    }

    /// A limiter only the map still holds has no request in flight.
    fn prune_idle_hosts(&self) -> usize {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hosts.len();
        hosts.retain(|_, limit| Arc::strong_count(limit) > 1);
        before - hosts.len()
    }
}

#[async_trait]
impl Deliverer for HttpDelivery {
    async fn deliver(&self, cancel: &CancellationToken, msg: &DeliveryMsg) -> Result<()> {
        let host = host_from_url(&msg.inbox)
            .ok_or_else(|| Error::InvalidMessage(format!("inbox without host: {}", msg.inbox)))?;
        let limit = self.host_limit(&host);
        let _permit = tokio::select! {
            p = limit.acquire_owned() => p.context("host limiter closed")?,
            _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
        };

        let resp = send_with_retry(
            || {
                self.client
                    .post(&msg.inbox)
                    .header(ACCEPT, ACTIVITY_JSON)
                    .header(CONTENT_TYPE, ACTIVITY_JSON)
                    .header(USER_AGENT, &self.user_agent)
                    .body(msg.body.to_vec())
            },
            self.attempts,
            cancel,
        )
        .await
        .with_context(|| format!("post to {}", msg.inbox))?;

        // The permit is held until the body is fully read, so the host
        // never has more than `max_per_host` responses open at once.
        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(inbox = %msg.inbox, %status, "read response body: {e}");
                String::new()
            }
        };
        if !status.is_success() {
            return Err(anyhow!("delivery failed: {} {}", status, text));
        }
        debug!(inbox = %msg.inbox, %status, "delivered");
        Ok(())
    }

    fn prune(&self) -> usize {
        self.prune_idle_hosts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_limiter_per_host() {
        let d = HttpDelivery::new(&EngineConfig {
            delivery_max_per_host: Some(2),
            ..Default::default()
        })
        .unwrap();
        let a = d.host_limit("a.test");
        let b = d.host_limit("a.test");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.available_permits(), 2);
        assert!(!Arc::ptr_eq(&a, &d.host_limit("b.test")));
    }

    #[test]
    fn prune_keeps_hosts_with_requests_in_flight() {
        let d = HttpDelivery::new(&EngineConfig::default()).unwrap();
        let busy = d.host_limit("busy.test");
        d.host_limit("idle.test");
        d.host_limit("idle2.test");

        assert_eq!(d.prune(), 2);
        assert_eq!(d.prune(), 0);
        assert!(Arc::ptr_eq(&busy, &d.host_limit("busy.test")));
        drop(busy);
        assert_eq!(d.prune(), 1);
    }

    #[tokio::test]
    async fn inbox_without_host_is_rejected() {
        let d = HttpDelivery::new(&EngineConfig::default()).unwrap();
        let msg = DeliveryMsg {
            id: "1".into(),
            actor_id: "https://local.test/users/a".into(),
            object_id: None,
            target_id: None,
            inbox: "https://".into(),
            body: Arc::from(&b"{}"[..]),
        };
        let err = d.deliver(&CancellationToken::new(), &msg).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidMessage(_))));
    }
}
