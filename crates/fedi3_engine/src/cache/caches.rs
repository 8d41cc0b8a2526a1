/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::decisions::{CachedMute, CachedVisibility};
use super::index::*;
use super::{CacheConfig, Cacheable, IndexConfig, StructCache};
use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, Notification, PollVote, Status,
    StatusFave, ThreadMute, UserMute,
};
use crate::util::now_ms;

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub visibility_ttl: Duration,
    pub mutes_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            visibility_ttl: Duration::from_secs(300),
            mutes_ttl: Duration::from_secs(300),
        }
    }
}

struct Sweeper {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Every entity and decision cache, built once and shared by reference.
pub struct Caches {
    pub account: StructCache<Account>,
    pub status: StructCache<Status>,
    pub follow: StructCache<Follow>,
    pub follow_request: StructCache<FollowRequest>,
    pub block: StructCache<Block>,
    pub status_fave: StructCache<StatusFave>,
    pub notification: StructCache<Notification>,
    pub user_mute: StructCache<UserMute>,
    pub thread_mute: StructCache<ThreadMute>,
    pub interaction_approval: StructCache<InteractionApproval>,
    pub poll_vote: StructCache<PollVote>,
    pub mutes: StructCache<CachedMute>,
    pub visibility: StructCache<CachedVisibility>,
    evictions: Arc<AtomicU64>,
    sweeper: Mutex<Option<Sweeper>>,
}

fn entity_cfg(name: &'static str, max: usize, indices: &[IndexConfig]) -> CacheConfig {
    CacheConfig {
        name,
        indices: indices.to_vec(),
        max_entries: max,
        ttl: None,
    }
}

const RELATION_INDICES: &[IndexConfig] = &[
    IndexConfig::unique(ID),
    IndexConfig::unique(URI),
    IndexConfig::unique(ACCOUNT_ID_TARGET_ACCOUNT_ID),
    IndexConfig::multiple(ACCOUNT_ID),
    IndexConfig::multiple(TARGET_ACCOUNT_ID),
];

impl Caches {
    pub fn new(settings: CacheSettings) -> Self {
        let max = settings.max_entries;
        let caches = Self {
            account: StructCache::new(entity_cfg(
                "account",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(URI),
                    IndexConfig::unique(URL),
                ],
            )),
            status: StructCache::new(entity_cfg(
                "status",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(URI),
                    IndexConfig::unique(URL),
                    IndexConfig::unique(BOOST_OF_ID_ACCOUNT_ID),
                ],
            )),
            follow: StructCache::new(entity_cfg("follow", max, RELATION_INDICES)),
            follow_request: StructCache::new(entity_cfg("follow_request", max, RELATION_INDICES)),
            block: StructCache::new(entity_cfg("block", max, RELATION_INDICES)),
            status_fave: StructCache::new(entity_cfg(
                "status_fave",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(URI),
                    IndexConfig::unique(ACCOUNT_ID_STATUS_ID),
                    IndexConfig::multiple(STATUS_ID),
                ],
            )),
            notification: StructCache::new(entity_cfg(
                "notification",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(NOTIFICATION_TYPE_TARGET_ORIGIN_STATUS),
                    IndexConfig::multiple(STATUS_ID),
                ],
            )),
            user_mute: StructCache::new(entity_cfg(
                "user_mute",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(ACCOUNT_ID_TARGET_ACCOUNT_ID),
                    IndexConfig::multiple(ACCOUNT_ID),
                ],
            )),
            thread_mute: StructCache::new(entity_cfg(
                "thread_mute",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(THREAD_ID_ACCOUNT_ID),
                    IndexConfig::multiple(ACCOUNT_ID),
                ],
            )),
            interaction_approval: StructCache::new(entity_cfg(
                "interaction_approval",
                max,
                &[IndexConfig::unique(ID), IndexConfig::unique(URI)],
            )),
            poll_vote: StructCache::new(entity_cfg(
                "poll_vote",
                max,
                &[
                    IndexConfig::unique(ID),
                    IndexConfig::unique(POLL_ID_ACCOUNT_ID),
                    IndexConfig::multiple(POLL_ID),
                ],
            )),
            mutes: StructCache::new(CacheConfig {
                name: "mutes",
                indices: vec![
                    IndexConfig::unique(TYPE_REQUESTER_ITEM),
                    IndexConfig::multiple(REQUESTER_ID),
                    IndexConfig::multiple(ITEM_ID),
                ],
                max_entries: max,
                ttl: Some(settings.mutes_ttl),
            }),
            visibility: StructCache::new(CacheConfig {
                name: "visibility",
                indices: vec![
                    IndexConfig::unique(ITEM_TYPE_REQUESTER_ITEM),
                    IndexConfig::multiple(REQUESTER_ID),
                    IndexConfig::multiple(ITEM_ID),
                ],
                max_entries: max,
                ttl: Some(settings.visibility_ttl),
            }),
            evictions: Arc::new(AtomicU64::new(0)),
            sweeper: Mutex::new(None),
        };
        caches.install_hooks();
        info!(max_entries = max, "caches initialized");
        caches
    }

    /// Derived decisions depend on the rows below them; dropping a row
    /// drops every decision that may have read it.
    fn install_hooks(&self) {
        let (vis, mutes) = (self.visibility.clone(), self.mutes.clone());
        self.account.set_invalidate_hook(move |a: &Account| {
            vis.invalidate(ITEM_ID, &[&a.id]);
            vis.invalidate(REQUESTER_ID, &[&a.id]);
            mutes.invalidate(ITEM_ID, &[&a.id]);
            mutes.invalidate(REQUESTER_ID, &[&a.id]);
        });

        let (vis, mutes) = (self.visibility.clone(), self.mutes.clone());
        self.status.set_invalidate_hook(move |s: &Status| {
            vis.invalidate(ITEM_ID, &[&s.id]);
            mutes.invalidate(ITEM_ID, &[&s.id]);
        });

        let vis = self.visibility.clone();
        self.block.set_invalidate_hook(move |b: &Block| {
            vis.invalidate(REQUESTER_ID, &[&b.account_id]);
            vis.invalidate(REQUESTER_ID, &[&b.target_account_id]);
        });

        let vis = self.visibility.clone();
        self.follow.set_invalidate_hook(move |f: &Follow| {
            vis.invalidate(REQUESTER_ID, &[&f.account_id]);
            vis.invalidate(REQUESTER_ID, &[&f.target_account_id]);
        });

        let vis = self.visibility.clone();
        self.follow_request.set_invalidate_hook(move |f: &FollowRequest| {
            vis.invalidate(REQUESTER_ID, &[&f.account_id]);
            vis.invalidate(REQUESTER_ID, &[&f.target_account_id]);
        });

        let mutes = self.mutes.clone();
        self.user_mute.set_invalidate_hook(move |m: &UserMute| {
            mutes.invalidate(REQUESTER_ID, &[&m.account_id]);
        });

        let mutes = self.mutes.clone();
        self.thread_mute.set_invalidate_hook(move |m: &ThreadMute| {
            mutes.invalidate(REQUESTER_ID, &[&m.account_id]);
        });

        count_evictions(&self.account, &self.evictions);
        count_evictions(&self.status, &self.evictions);
        count_evictions(&self.follow, &self.evictions);
        count_evictions(&self.follow_request, &self.evictions);
        count_evictions(&self.block, &self.evictions);
        count_evictions(&self.status_fave, &self.evictions);
        count_evictions(&self.notification, &self.evictions);
        count_evictions(&self.user_mute, &self.evictions);
        count_evictions(&self.thread_mute, &self.evictions);
        count_evictions(&self.interaction_approval, &self.evictions);
        count_evictions(&self.poll_vote, &self.evictions);
        count_evictions(&self.mutes, &self.evictions);
        count_evictions(&self.visibility, &self.evictions);
    }

    /// Drops visibility decisions made for any of `account_ids`. Used when
    /// a relationship row is created, where no cached row exists to
    /// trigger the hooks.
    pub fn invalidate_visibility_for(&self, account_ids: &[&str]) {
        for id in account_ids {
            self.visibility.invalidate(REQUESTER_ID, &[id]);
        }
    }

    /// Same as [`Caches::invalidate_visibility_for`] for mute decisions.
    pub fn invalidate_mutes_for(&self, account_ids: &[&str]) {
        for id in account_ids {
            self.mutes.invalidate(REQUESTER_ID, &[id]);
        }
    }

    /// Total values evicted for capacity or expiry since startup.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Evicts expired entries from every cache.
    pub fn sweep(&self, now_ms: i64) -> usize {
        self.account.sweep(now_ms)
            + self.status.sweep(now_ms)
            + self.follow.sweep(now_ms)
            + self.follow_request.sweep(now_ms)
            + self.block.sweep(now_ms)
            + self.status_fave.sweep(now_ms)
            + self.notification.sweep(now_ms)
            + self.user_mute.sweep(now_ms)
            + self.thread_mute.sweep(now_ms)
            + self.interaction_approval.sweep(now_ms)
            + self.poll_vote.sweep(now_ms)
            + self.mutes.sweep(now_ms)
            + self.visibility.sweep(now_ms)
    }

    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let mut guard = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let caches = self.clone();
        let join = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let n = caches.sweep(now_ms());
                        if n > 0 {
                            debug!(evicted = n, "cache sweep");
                        }
                    }
                }
            }
        });
        info!(interval_secs = interval.as_secs(), "cache sweeper started");
        *guard = Some(Sweeper { cancel, join });
    }

    pub async fn stop_sweeper(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(s) = sweeper {
            s.cancel.cancel();
            let _ = s.join.await;
            info!("cache sweeper stopped");
        }
    }
}

fn count_evictions<T: Cacheable>(cache: &StructCache<T>, counter: &Arc<AtomicU64>) {
    let counter = counter.clone();
    cache.set_evict_hook(move |_: &T| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DecisionItem;

    #[test]
    fn dropping_a_block_drops_visibility_decisions() {
        let caches = Caches::new(CacheSettings::default());
        caches.visibility.put(&CachedVisibility {
            item_type: DecisionItem::Status,
            requester_id: "viewer".into(),
            item_id: "s1".into(),
            value: true,
        });
        let block = Block {
            id: "b".into(),
            uri: "https://x/blocks/b".into(),
            account_id: "author".into(),
            target_account_id: "viewer".into(),
            ..Default::default()
        };
        caches.block.put(&block);
        caches.block.invalidate(ACCOUNT_ID_TARGET_ACCOUNT_ID, &["author", "viewer"]);
        assert!(caches.visibility.is_empty());
    }

    #[test]
    fn dropping_a_thread_mute_drops_mute_decisions() {
        let caches = Caches::new(CacheSettings::default());
        let mut m = CachedMute::unmuted(DecisionItem::Status, "r", "s");
        m.mute = true;
        caches.mutes.put(&m);
        caches.thread_mute.put(&ThreadMute {
            id: "tm".into(),
            thread_id: "t".into(),
            account_id: "r".into(),
            created_at_ms: 0,
        });
        caches.thread_mute.invalidate(ID, &["tm"]);
        assert!(caches.mutes.get(TYPE_REQUESTER_ITEM, &["status", "r", "s"]).is_none());
    }

    #[tokio::test]
    async fn sweeper_expires_decisions_until_stopped() {
        let caches = Arc::new(Caches::new(CacheSettings::default()));
        let mut m = CachedMute::unmuted(DecisionItem::Account, "r", "a");
        m.mute = true;
        m.mute_expiry = Some(1);
        caches.mutes.put(&m);

        caches.start_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        caches.stop_sweeper().await;

        assert!(caches.mutes.is_empty());
        assert_eq!(caches.evictions(), 1);
    }
}
