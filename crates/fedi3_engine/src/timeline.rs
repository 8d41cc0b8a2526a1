/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! In-memory home and list timelines.
//!
//! Each owner (an account for home timelines, a list for list timelines)
//! keeps the IDs of its most recent statuses, newest last, along with a
//! prepared copy of each status once it has been read. Owners with no
//! timeline in memory are served from storage and populated from the
//! result.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::db::Db;
use crate::error::optional;
use crate::model::Status;
use crate::paging::Page;

#[derive(Debug, Clone)]
struct Entry {
    account_id: String,
    boost_of_id: Option<String>,
    boost_of_account_id: Option<String>,
    prepared: Option<Status>,
}

impl Entry {
    fn of(status: &Status) -> Self {
        Self {
            account_id: status.account_id.clone(),
            boost_of_id: status.boost_of_id.clone(),
            boost_of_account_id: status.boost_of_account_id.clone(),
            prepared: None,
        }
    }

    fn involves_account(&self, account_id: &str) -> bool {
        self.account_id == account_id || self.boost_of_account_id.as_deref() == Some(account_id)
    }

    fn involves_status(&self, status_id: &str, own_id: &str) -> bool {
        own_id == status_id || self.boost_of_id.as_deref() == Some(status_id)
    }
}

#[derive(Debug, Default)]
struct Timeline {
    /// Keyed by status ID, which sorts by creation time.
    items: BTreeMap<String, Entry>,
}

pub struct Timelines {
    name: &'static str,
    max_items: usize,
    prune_to: usize,
    inner: Mutex<HashMap<String, Timeline>>,
}

impl Timelines {
    pub fn new(name: &'static str, max_items: usize, prune_to: usize) -> Self {
        Self {
            name,
            max_items: max_items.max(1),
            prune_to: prune_to.min(max_items).max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Timeline>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `status` to `owner`'s timeline. Returns false when it was
    /// already there, or when it boosts something the timeline already
    /// shows (the original or another boost of it).
    pub fn ingest(&self, owner: &str, status: &Status) -> bool {
        let mut timelines = self.lock();
        let tl = timelines.entry(owner.to_string()).or_default();
        if tl.items.contains_key(&status.id) {
            return false;
        }
        if let Some(boost_of_id) = &status.boost_of_id {
            let seen = tl.items.iter().any(|(id, e)| e.involves_status(boost_of_id, id));
            if seen {
                debug!(timeline = self.name, owner, status = %status.id, "boosted status already on timeline");
                return false;
            }
        }
        tl.items.insert(status.id.clone(), Entry::of(status));
        true
    }

    /// Drops every item `account_id` wrote or had boosted from `owner`'s
    /// timeline.
    pub fn wipe_items_from_account_id(&self, owner: &str, account_id: &str) -> usize {
        let mut timelines = self.lock();
        let Some(tl) = timelines.get_mut(owner) else {
            return 0;
        };
        let before = tl.items.len();
        tl.items.retain(|_, e| !e.involves_account(account_id));
        before - tl.items.len()
    }

    /// Drops the prepared copy of `status_id` and of boosts of it in every
    /// timeline, so the next read picks up new counts or edits.
    pub fn unprepare_item_from_all(&self, status_id: &str) {
        let mut timelines = self.lock();
        for tl in timelines.values_mut() {
            for (id, e) in tl.items.iter_mut() {
                if e.involves_status(status_id, id) {
                    e.prepared = None;
                }
            }
        }
    }

    /// Removes the statuses, and boosts of them, from every timeline.
    pub fn remove_by_status_ids(&self, status_ids: &[&str]) -> usize {
        let mut timelines = self.lock();
        let mut removed = 0;
        for tl in timelines.values_mut() {
            let before = tl.items.len();
            tl.items
                .retain(|id, e| !status_ids.iter().any(|s| e.involves_status(s, id)));
            removed += before - tl.items.len();
        }
        removed
    }

    /// Owners whose timeline shows `status_id` or a boost of it.
    pub fn owners_of(&self, status_id: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, tl)| tl.items.iter().any(|(id, e)| e.involves_status(status_id, id)))
            .map(|(owner, _)| owner.clone())
            .collect()
    }

    /// Forgets an owner's timeline entirely.
    pub fn remove_timeline(&self, owner: &str) {
        self.lock().remove(owner);
    }

    pub fn len(&self, owner: &str) -> usize {
        self.lock().get(owner).map_or(0, |tl| tl.items.len())
    }

    /// Trims every timeline longer than the maximum down to the newest
    /// `prune_to` items.
    pub fn prune(&self) -> usize {
        let mut timelines = self.lock();
        let mut pruned = 0;
        for tl in timelines.values_mut() {
            if tl.items.len() <= self.max_items {
                continue;
            }
            let excess = tl.items.len() - self.prune_to;
            let cut: Vec<String> = tl.items.keys().take(excess).cloned().collect();
            for id in cut {
                tl.items.remove(&id);
            }
            pruned += excess;
        }
        if pruned > 0 {
            debug!(timeline = self.name, pruned, "timelines pruned");
        }
        pruned
    }

    /// One page of `owner`'s timeline, newest first.
    ///
    /// Served from memory when the timeline is loaded and the page does not
    /// reach past its oldest item; otherwise `fallback` queries storage and
    /// the result is ingested.
    pub async fn get_timeline<F, Fut>(
        &self,
        db: &Db,
        owner: &str,
        page: &Page<String>,
        fallback: F,
    ) -> Result<Vec<Status>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Status>>>,
    {
        let ids = {
            let timelines = self.lock();
            match timelines.get(owner) {
                Some(tl) if covers(tl, page) => {
                    let desc: Vec<String> = tl.items.keys().rev().cloned().collect();
                    Some(page.page_desc(&desc))
                }
                _ => None,
            }
        };

        let Some(ids) = ids else {
            let statuses = fallback().await?;
            for s in &statuses {
                self.ingest(owner, s);
                self.set_prepared(owner, s);
            }
            return Ok(statuses);
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(s) = self.prepared(owner, &id) {
                out.push(s);
                continue;
            }
            match optional(db.get_status_by_id(&id).await)? {
                Some(s) => {
                    self.set_prepared(owner, &s);
                    out.push(s);
                }
                None => {
                    // Deleted underneath us.
                    self.remove_by_status_ids(&[&id]);
                }
            }
        }
        Ok(out)
    }

    fn prepared(&self, owner: &str, status_id: &str) -> Option<Status> {
        self.lock()
            .get(owner)?
            .items
            .get(status_id)?
            .prepared
            .clone()
    }

    fn set_prepared(&self, owner: &str, status: &Status) {
        if let Some(e) = self
            .lock()
            .get_mut(owner)
            .and_then(|tl| tl.items.get_mut(&status.id))
        {
            e.prepared = Some(status.clone());
        }
    }
}

/// Whether the in-memory items can answer `page`: an upper bound older
/// than everything held may have been pruned away.
fn covers(tl: &Timeline, page: &Page<String>) -> bool {
    if tl.items.is_empty() {
        return false;
    }
    match (page.get_max(), tl.items.keys().next()) {
        (Some(max), Some(oldest)) => max > oldest,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{max_id, min_id};
    use crate::testutil::{remote_account, status_by, test_db};

    fn status(id: &str, account: &str) -> Status {
        Status {
            id: id.into(),
            uri: format!("https://x/statuses/{id}"),
            account_id: account.into(),
            ..Default::default()
        }
    }

    fn boost(id: &str, account: &str, of: &Status) -> Status {
        Status {
            boost_of_id: Some(of.id.clone()),
            boost_of_account_id: Some(of.account_id.clone()),
            ..status(id, account)
        }
    }

    #[test]
    fn ingest_skips_duplicates_and_repeat_boosts() {
        let tl = Timelines::new("home", 10, 5);
        let original = status("01", "a");
        assert!(tl.ingest("me", &original));
        assert!(!tl.ingest("me", &original));
        assert!(!tl.ingest("me", &boost("02", "b", &original)));

        let other = status("03", "c");
        assert!(tl.ingest("you", &boost("04", "b", &other)));
        assert!(!tl.ingest("you", &boost("05", "d", &other)));
        assert_eq!(tl.len("me"), 1);
        assert_eq!(tl.len("you"), 1);
    }

    #[test]
    fn wipe_and_remove_cover_boosts() {
        let tl = Timelines::new("home", 10, 5);
        let a = status("01", "a");
        tl.ingest("me", &a);
        tl.ingest("me", &status("02", "b"));
        tl.ingest("me", &boost("03", "c", &status("00", "a")));
        assert_eq!(tl.wipe_items_from_account_id("me", "a"), 2);
        assert_eq!(tl.len("me"), 1);

        tl.ingest("you", &a);
        tl.ingest("you", &boost("04", "b", &status("09", "z")));
        assert_eq!(tl.remove_by_status_ids(&["01", "09"]), 2);
        assert_eq!(tl.len("you"), 0);
    }

    #[test]
    fn prune_keeps_the_newest() {
        let tl = Timelines::new("home", 4, 2);
        for i in 0..5 {
            tl.ingest("me", &status(&format!("{i:02}"), "a"));
        }
        assert_eq!(tl.prune(), 3);
        assert_eq!(tl.len("me"), 2);
        assert_eq!(tl.prune(), 0);
    }

    async fn not_called() -> Result<Vec<Status>> {
        panic!("should be served from memory")
    }

    #[tokio::test]
    async fn reads_fall_back_to_storage_then_memory() {
        let (db, _dir) = test_db();
        let author = remote_account(&db, "author", "remote.test").await;
        let s1 = status_by(&db, &author).await;
        let s2 = status_by(&db, &author).await;
        let tl = Timelines::new("home", 10, 5);
        let page = Page::new(min_id("", ""), max_id(""), 10);

        let mut fallback_calls = 0;
        let got = tl
            .get_timeline(&db, "me", &page, || {
                fallback_calls += 1;
                let (a, b) = (s1.clone(), s2.clone());
                async move { Ok(vec![b, a]) }
            })
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(fallback_calls, 1);

        let got = tl
            .get_timeline(&db, "me", &page, not_called)
            .await
            .unwrap();
        let ids: Vec<&str> = got.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![s2.id.as_str(), s1.id.as_str()]);

        tl.unprepare_item_from_all(&s1.id);
        let got = tl
            .get_timeline(&db, "me", &page, not_called)
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
    }
}
