/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::util::now_ms;

/// Values that can live in a [`StructCache`].
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Key of this value under the named index, `None` when the value is
    /// not reachable through that index.
    fn index_key(&self, index: &str) -> Option<String>;

    /// Copy with populated associations dropped, so nothing handed out by
    /// the cache shares substructure with what it keeps.
    fn detach(&self) -> Self {
        self.clone()
    }

    /// Domain expiry of the cached fact, independent of the cache TTL.
    fn expires_at_ms(&self) -> Option<i64> {
        None
    }
}

pub type Hook<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub name: &'static str,
    /// Several values may share one key.
    pub multiple: bool,
}

impl IndexConfig {
    pub const fn unique(name: &'static str) -> Self {
        Self {
            name,
            multiple: false,
        }
    }

    pub const fn multiple(name: &'static str) -> Self {
        Self {
            name,
            multiple: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub name: &'static str,
    /// The first index is the primary one and must be unique.
    pub indices: Vec<IndexConfig>,
    pub max_entries: usize,
    pub ttl: Option<Duration>,
}

/// Joins key parts the same way for inserts and lookups.
pub fn key(parts: &[&str]) -> String {
    parts.join("\u{1f}")
}

/// Like [`key`], but `None` when any part is empty.
pub fn key_of(parts: &[&str]) -> Option<String> {
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(key(parts))
}

struct Entry<T> {
    value: T,
    keys: Vec<(usize, String)>,
    stored_at_ms: i64,
    tick: u64,
}

struct State<T> {
    entries: HashMap<String, Entry<T>>,
    indices: Vec<HashMap<String, Vec<String>>>,
    lru: BTreeMap<u64, String>,
    tick: u64,
    /// Bumped by every write; loads only insert if it did not move.
    epoch: u64,
}

struct Shared<T> {
    cfg: CacheConfig,
    state: Mutex<State<T>>,
    on_invalidate: OnceLock<Hook<T>>,
    on_evict: OnceLock<Hook<T>>,
}

/// In-memory cache of one entity kind, reachable by named indices.
///
/// Reads and writes both copy through [`Cacheable::detach`]. Hooks run
/// after the internal lock has been released, so a hook may freely call
/// into other caches (or this one).
pub struct StructCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for StructCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Cacheable> StructCache<T> {
    pub fn new(cfg: CacheConfig) -> Self {
        debug_assert!(!cfg.indices.is_empty(), "cache needs a primary index");
        debug_assert!(
            cfg.indices.first().map_or(false, |i| !i.multiple),
            "primary index must be unique"
        );
        let indices = cfg.indices.iter().map(|_| HashMap::new()).collect();
        debug!(
            cache = cfg.name,
            max_entries = cfg.max_entries,
            "cache initialized"
        );
        Self {
            shared: Arc::new(Shared {
                cfg,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    indices,
                    lru: BTreeMap::new(),
                    tick: 0,
                    epoch: 0,
                }),
                on_invalidate: OnceLock::new(),
                on_evict: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.cfg.name
    }

    /// Runs for every value removed by an invalidation.
    pub fn set_invalidate_hook(&self, hook: impl Fn(&T) + Send + Sync + 'static) {
        if self.shared.on_invalidate.set(Arc::new(hook)).is_err() {
            warn!(cache = self.name(), "invalidate hook already set");
        }
    }

    /// Runs for every value removed by capacity or TTL eviction.
    pub fn set_evict_hook(&self, hook: impl Fn(&T) + Send + Sync + 'static) {
        if self.shared.on_evict.set(Arc::new(hook)).is_err() {
            warn!(cache = self.name(), "evict hook already set");
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_pos(&self, index: &str) -> Option<usize> {
        let pos = self.shared.cfg.indices.iter().position(|i| i.name == index);
        if pos.is_none() {
            warn!(cache = self.name(), index, "unknown cache index");
        }
        pos
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First value stored under `index`/`parts`.
    pub fn get(&self, index: &str, parts: &[&str]) -> Option<T> {
        let pos = self.index_pos(index)?;
        let k = key(parts);
        let mut st = self.lock();
        let pk = st.indices[pos].get(&k)?.first()?.clone();
        touch(&mut st, &pk);
        st.entries.get(&pk).map(|e| e.value.detach())
    }

    /// Every value stored under `index`/`parts`.
    pub fn get_all(&self, index: &str, parts: &[&str]) -> Vec<T> {
        let Some(pos) = self.index_pos(index) else {
            return Vec::new();
        };
        let k = key(parts);
        let mut st = self.lock();
        let pks = st.indices[pos].get(&k).cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(pks.len());
        for pk in pks {
            touch(&mut st, &pk);
            if let Some(e) = st.entries.get(&pk) {
                out.push(e.value.detach());
            }
        }
        out
    }

    /// Cached value under `index`/`parts`, or the loader's result.
    ///
    /// A loaded value is only cached if no write hit this cache while the
    /// loader ran, so a load racing an invalidation cannot resurrect the
    /// stale row.
    pub async fn load<F, Fut>(&self, index: &str, parts: &[&str], loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(v) = self.get(index, parts) {
            return Ok(v);
        }
        let epoch = self.lock().epoch;

        let value = loader().await?;

        let evicted = {
            let mut st = self.lock();
            if st.epoch != epoch {
                trace!(cache = self.name(), index, "cache written during load, not caching");
                Vec::new()
            } else {
                self.insert_locked(&mut st, value.detach())
            }
        };
        self.run_evict(evicted);
        Ok(value)
    }

    /// Persists `value` with `persist` and caches it only if that
    /// succeeded.
    pub async fn store<F, Fut>(&self, value: &T, persist: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        persist().await?;
        self.put(value);
        Ok(())
    }

    /// Caches `value` directly, replacing any entry with the same keys.
    pub fn put(&self, value: &T) {
        let evicted = {
            let mut st = self.lock();
            st.epoch += 1;
            self.insert_locked(&mut st, value.detach())
        };
        self.run_evict(evicted);
    }

    /// Removes every value under `index`/`parts`, with all their other
    /// index keys, and runs the invalidate hook for each.
    pub fn invalidate(&self, index: &str, parts: &[&str]) {
        let Some(pos) = self.index_pos(index) else {
            return;
        };
        let k = key(parts);
        let removed = {
            let mut st = self.lock();
            st.epoch += 1;
            let pks = st.indices[pos].get(&k).cloned().unwrap_or_default();
            pks.iter()
                .filter_map(|pk| remove_locked(&mut st, pk))
                .collect::<Vec<_>>()
        };
        self.run_invalidate(removed);
    }

    pub fn invalidate_ids(&self, ids: &[&str]) {
        let primary = self.shared.cfg.indices[0].name;
        for id in ids {
            self.invalidate(primary, &[id]);
        }
    }

    /// Drops everything without running hooks.
    pub fn clear(&self) {
        let mut st = self.lock();
        st.epoch += 1;
        st.entries.clear();
        st.lru.clear();
        for idx in st.indices.iter_mut() {
            idx.clear();
        }
    }

    /// Evicts entries whose domain expiry or cache TTL lapsed by `now_ms`.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let ttl_ms = self.shared.cfg.ttl.map(|d| d.as_millis() as i64);
        let evicted = {
            let mut st = self.lock();
            let stale = st
                .entries
                .iter()
                .filter(|(_, e)| {
                    e.value.expires_at_ms().map_or(false, |at| at <= now_ms)
                        || ttl_ms.map_or(false, |ttl| e.stored_at_ms + ttl <= now_ms)
                })
                .map(|(pk, _)| pk.clone())
                .collect::<Vec<_>>();
            stale
                .iter()
                .filter_map(|pk| remove_locked(&mut st, pk))
                .collect::<Vec<_>>()
        };
        let n = evicted.len();
        self.run_evict(evicted);
        n
    }

    fn insert_locked(&self, st: &mut State<T>, value: T) -> Vec<T> {
        let cfg = &self.shared.cfg;
        let Some(pk) = value.index_key(cfg.indices[0].name) else {
            trace!(cache = cfg.name, "value has no primary key, not caching");
            return Vec::new();
        };

        let mut evicted = Vec::new();
        remove_locked(st, &pk);

        let mut keys = Vec::new();
        for (pos, idx) in cfg.indices.iter().enumerate() {
            let Some(k) = value.index_key(idx.name) else {
                continue;
            };
            if !idx.multiple {
                // A unique key now points elsewhere: the old holder goes.
                let other = st.indices[pos].get(&k).and_then(|v| v.first()).cloned();
                if let Some(other) = other.filter(|o| *o != pk) {
                    evicted.extend(remove_locked(st, &other));
                }
            }
            keys.push((pos, k));
        }

        for (pos, k) in &keys {
            st.indices[*pos].entry(k.clone()).or_default().push(pk.clone());
        }
        st.tick += 1;
        let tick = st.tick;
        st.lru.insert(tick, pk.clone());
        st.entries.insert(
            pk,
            Entry {
                value,
                keys,
                stored_at_ms: now_ms(),
                tick,
            },
        );

        while cfg.max_entries > 0 && st.entries.len() > cfg.max_entries {
            let Some((_, oldest)) = st.lru.pop_first() else {
                break;
            };
            evicted.extend(remove_locked(st, &oldest));
        }
        evicted
    }

    fn run_invalidate(&self, removed: Vec<T>) {
        if let Some(hook) = self.shared.on_invalidate.get() {
            for v in &removed {
                hook(v);
            }
        }
    }

    fn run_evict(&self, evicted: Vec<T>) {
        if let Some(hook) = self.shared.on_evict.get() {
            for v in &evicted {
                hook(v);
            }
        }
    }
}

fn touch<T>(st: &mut State<T>, pk: &str) {
    st.tick += 1;
    let tick = st.tick;
    let Some(e) = st.entries.get_mut(pk) else {
        return;
    };
    let old = std::mem::replace(&mut e.tick, tick);
    st.lru.remove(&old);
    st.lru.insert(tick, pk.to_string());
}

fn remove_locked<T>(st: &mut State<T>, pk: &str) -> Option<T> {
    let e = st.entries.remove(pk)?;
    st.lru.remove(&e.tick);
    for (pos, k) in &e.keys {
        if let Some(pks) = st.indices[*pos].get_mut(k) {
            pks.retain(|p| p != pk);
            if pks.is_empty() {
                st.indices[*pos].remove(k);
            }
        }
    }
    Some(e.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        owner: String,
        label: String,
        shared: Option<Arc<String>>,
        expires: Option<i64>,
    }

    impl Cacheable for Item {
        fn index_key(&self, index: &str) -> Option<String> {
            match index {
                "ID" => key_of(&[&self.id]),
                "Owner" => key_of(&[&self.owner]),
                "Owner.Label" => key_of(&[&self.owner, &self.label]),
                _ => None,
            }
        }

        fn detach(&self) -> Self {
            Self {
                shared: None,
                ..self.clone()
            }
        }

        fn expires_at_ms(&self) -> Option<i64> {
            self.expires
        }
    }

    fn item(id: &str, owner: &str, label: &str) -> Item {
        Item {
            id: id.into(),
            owner: owner.into(),
            label: label.into(),
            shared: None,
            expires: None,
        }
    }

    fn cache(max: usize) -> StructCache<Item> {
        StructCache::new(CacheConfig {
            name: "item",
            indices: vec![
                IndexConfig::unique("ID"),
                IndexConfig::multiple("Owner"),
                IndexConfig::unique("Owner.Label"),
            ],
            max_entries: max,
            ttl: None,
        })
    }

    #[tokio::test]
    async fn returned_values_are_isolated_copies() {
        let c = cache(0);
        let mut orig = item("1", "a", "x");
        orig.shared = Some(Arc::new("attachment".into()));
        c.put(&orig);

        let mut first = c.get("ID", &["1"]).unwrap();
        assert!(first.shared.is_none());
        first.label = "mutated".into();

        let second = c
            .load("ID", &["1"], || async { Err(Error::NotFound.into()) })
            .await
            .unwrap();
        assert_eq!(second.label, "x");
    }

    #[tokio::test]
    async fn invalidate_forces_next_load_through_loader() {
        let c = cache(0);
        let calls = AtomicUsize::new(0);
        let load = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(item("1", "a", "x"))
        };
        c.load("ID", &["1"], load).await.unwrap();
        c.load("ID", &["1"], load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        c.invalidate("Owner.Label", &["a", "x"]);
        assert!(c.get("ID", &["1"]).is_none());
        assert!(c.get_all("Owner", &["a"]).is_empty());

        c.load("ID", &["1"], load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_racing_invalidation_is_not_cached() {
        let c = cache(0);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let loading = {
            let c = c.clone();
            tokio::spawn(async move {
                c.load("ID", &["1"], || async move {
                    let _ = started_tx.send(());
                    let _ = rx.await;
                    Ok(item("1", "a", "stale"))
                })
                .await
            })
        };
        started_rx.await.unwrap();
        c.invalidate("ID", &["1"]);
        let _ = tx.send(());
        assert_eq!(loading.await.unwrap().unwrap().label, "stale");
        assert!(c.get("ID", &["1"]).is_none());
    }

    #[tokio::test]
    async fn failed_persist_is_not_cached() {
        let c = cache(0);
        let it = item("1", "a", "x");
        let res = c
            .store(&it, || async { Err(anyhow::anyhow!("disk full")) })
            .await;
        assert!(res.is_err());
        assert!(c.is_empty());
        c.store(&it, || async { Ok(()) }).await.unwrap();
        assert_eq!(c.get("Owner.Label", &["a", "x"]), Some(it));
    }

    #[test]
    fn multiple_index_and_unique_conflicts() {
        let c = cache(0);
        c.put(&item("1", "a", "x"));
        c.put(&item("2", "a", "y"));
        assert_eq!(c.get_all("Owner", &["a"]).len(), 2);

        // Same owner+label as "1": the unique index moves to "3".
        c.put(&item("3", "a", "x"));
        assert!(c.get("ID", &["1"]).is_none());
        assert_eq!(c.get("Owner.Label", &["a", "x"]).unwrap().id, "3");
    }

    #[test]
    fn capacity_evicts_least_recently_used_and_runs_hook() {
        let c = cache(2);
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        c.set_evict_hook(move |v: &Item| sink.lock().unwrap().push(v.id.clone()));

        c.put(&item("1", "a", "1"));
        c.put(&item("2", "a", "2"));
        let _ = c.get("ID", &["1"]);
        c.put(&item("3", "a", "3"));

        assert_eq!(*evicted.lock().unwrap(), vec!["2".to_string()]);
        assert!(c.get("ID", &["1"]).is_some());
        assert_eq!(c.get_all("Owner", &["a"]).len(), 2);
    }

    #[test]
    fn sweep_removes_expired_and_keeps_indices_consistent() {
        let c = cache(0);
        let mut expiring = item("1", "a", "x");
        expiring.expires = Some(100);
        c.put(&expiring);
        c.put(&item("2", "a", "y"));

        assert_eq!(c.sweep(99), 0);
        assert_eq!(c.sweep(100), 1);
        assert!(c.get("Owner.Label", &["a", "x"]).is_none());
        assert_eq!(c.get_all("Owner", &["a"]).len(), 1);
    }

    #[test]
    fn invalidate_hook_sees_removed_values() {
        let c = cache(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.set_invalidate_hook(move |v: &Item| sink.lock().unwrap().push(v.id.clone()));
        c.put(&item("1", "a", "x"));
        c.put(&item("2", "a", "y"));
        c.invalidate("Owner", &["a"]);
        let mut ids = seen.lock().unwrap().clone();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(c.is_empty());
    }
}
