/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Shared fixtures for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheSettings, Caches};
use crate::config::EngineConfig;
use crate::db::Db;
use crate::error::{is_already_exists, optional, Error};
use crate::federation::{Dereferencer, Outbound, Outbox};
use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, List, ListEntry, Notification,
    NotificationType, Poll, PollVote, RelationFilter, Report, StatsDelta, Status, StatusFave,
    ThreadMute, UserMute, Visibility,
};
use crate::paging::Page;
use crate::processing::{Processor, ProcessorParts};
use crate::social_db::SocialDb;
use crate::storage::Storage;
use crate::stream::Streams;
use crate::util::{new_id_at, now_ms};
use crate::workers::Workers;

static SEQ: AtomicI64 = AtomicI64::new(0);

/// IDs handed out by fixtures sort in creation order even within one
/// millisecond.
pub fn seq_id() -> String {
    new_id_at(now_ms() + SEQ.fetch_add(1, Ordering::Relaxed))
}

pub fn test_store() -> (Arc<SocialDb>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SocialDb::open(dir.path().join("social.db")).expect("open db");
    (Arc::new(store), dir)
}

pub fn db_over(store: Arc<dyn Storage>) -> Db {
    Db::new(store, Arc::new(Caches::new(CacheSettings::default())))
}

pub fn test_db() -> (Db, TempDir) {
    let (store, dir) = test_store();
    (db_over(store), dir)
}

fn account(name: &str, domain: Option<&str>) -> Account {
    let base = match domain {
        Some(d) => format!("https://{d}/users/{name}"),
        None => format!("https://local.test/users/{name}"),
    };
    Account {
        id: seq_id(),
        uri: base.clone(),
        url: base.clone(),
        username: name.to_string(),
        domain: domain.map(str::to_string),
        display_name: name.to_string(),
        inbox_uri: format!("{base}/inbox"),
        followers_uri: format!("{base}/followers"),
        created_at_ms: now_ms(),
        updated_at_ms: now_ms(),
        ..Default::default()
    }
}

pub async fn local_account(db: &Db, name: &str) -> Account {
    let a = account(name, None);
    db.put_account(&a).await.expect("put local account");
    a
}

pub async fn remote_account(db: &Db, name: &str, domain: &str) -> Account {
    let a = account(name, Some(domain));
    db.put_account(&a).await.expect("put remote account");
    a
}

/// A public top-level status, not yet stored.
pub fn new_status(author: &Account) -> Status {
    let id = seq_id();
    Status {
        uri: format!("{}/statuses/{id}", author.uri),
        url: format!("{}/statuses/{id}", author.uri),
        content: format!("post {id}"),
        local: author.is_local(),
        account_id: author.id.clone(),
        account_uri: author.uri.clone(),
        thread_id: seq_id(),
        visibility: Visibility::Public,
        created_at_ms: now_ms(),
        updated_at_ms: now_ms(),
        id,
        ..Default::default()
    }
}

pub async fn status_by(db: &Db, author: &Account) -> Status {
    let s = new_status(author);
    db.put_status(&s).await.expect("put status");
    s
}

/// Stands in for the federation layer: "remote" objects are whatever the
/// test served, and every resolved object is stored the way the real
/// dereferencer stores it.
pub struct FakeDereferencer {
    db: Db,
    statuses: Mutex<HashMap<String, Status>>,
    accounts: Mutex<HashMap<String, Account>>,
}

impl FakeDereferencer {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            statuses: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn serve_status(&self, s: Status) {
        self.statuses.lock().unwrap().insert(s.uri.clone(), s);
    }

    pub fn serve_account(&self, a: Account) {
        self.accounts.lock().unwrap().insert(a.uri.clone(), a);
    }

    async fn store_new(&self, status: &Status) -> Result<Option<Status>> {
        match self.db.put_status(status).await {
            Ok(()) => Ok(Some(status.clone())),
            Err(e) if is_already_exists(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Dereferencer for FakeDereferencer {
    async fn refresh_status(
        &self,
        _cancel: &CancellationToken,
        _requesting_username: &str,
        existing: &Status,
        _ap_object: Option<&serde_json::Value>,
        fresh: Duration,
    ) -> Result<Option<Status>> {
        if fresh.is_zero() {
            self.db.update_status(existing).await?;
            return Ok(Some(existing.clone()));
        }
        self.store_new(existing).await
    }

    async fn get_status_by_uri(
        &self,
        _cancel: &CancellationToken,
        _requesting_username: &str,
        uri: &str,
    ) -> Result<Option<Status>> {
        let served = self.statuses.lock().unwrap().get(uri).cloned();
        let status = served.ok_or_else(|| Error::Unretrievable(uri.to_string()))?;
        self.store_new(&status).await
    }

    async fn refresh_account(
        &self,
        _cancel: &CancellationToken,
        _requesting_username: &str,
        existing: &Account,
        _ap_object: Option<&serde_json::Value>,
        _fresh: Duration,
    ) -> Result<Account> {
        let mut a = existing.clone();
        a.fetched_at_ms = now_ms();
        self.db.update_account(&a).await?;
        Ok(a)
    }

    async fn get_account_by_uri(
        &self,
        _cancel: &CancellationToken,
        _requesting_username: &str,
        uri: &str,
        _force: bool,
    ) -> Result<Account> {
        let served = self.accounts.lock().unwrap().get(uri).cloned();
        match served {
            Some(a) => {
                match self.db.put_account(&a).await {
                    Ok(()) => {}
                    Err(e) if is_already_exists(&e) => self.db.update_account(&a).await?,
                    Err(e) => return Err(e),
                }
                Ok(a)
            }
            None => match optional(self.db.get_account_by_uri(uri).await)? {
                Some(a) => Ok(a),
                None => Err(Error::Unretrievable(uri.to_string()).into()),
            },
        }
    }

    async fn enrich_announce(
        &self,
        _cancel: &CancellationToken,
        _requesting_username: &str,
        boost: &Status,
    ) -> Result<Status> {
        let target_uri = boost.boost_of_uri.clone().unwrap_or_default();
        let original = optional(self.db.get_status_by_uri(&target_uri).await)?
            .ok_or_else(|| Error::Unretrievable(target_uri.clone()))?;
        let mut boost = boost.clone();
        boost.boost_of_id = Some(original.id.clone());
        boost.boost_of_account_id = Some(original.account_id.clone());
        self.db.put_status(&boost).await?;
        Ok(boost)
    }
}

pub type SendHook = Arc<dyn Fn(&Outbound) -> BoxFuture<'static, ()> + Send + Sync>;

/// Keeps every outbound activity in order instead of sending it. An
/// optional hook runs at send time, before the handler carries on.
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<Outbound>>,
    hook: Mutex<Option<SendHook>>,
}

impl RecordingOutbox {
    pub fn on_send(&self, hook: SendHook) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(Outbound::name).collect()
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send(&self, _cancel: &CancellationToken, activity: Outbound) -> Result<()> {
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&activity).await;
        }
        self.sent.lock().unwrap().push(activity);
        Ok(())
    }
}

/// A processor over a fresh database with fake collaborators.
pub struct Harness {
    pub processor: Arc<Processor>,
    pub db: Db,
    pub deref: Arc<FakeDereferencer>,
    pub outbox: Arc<RecordingOutbox>,
    /// Never started, so queued messages stay put.
    pub workers: Arc<Workers>,
    _dir: TempDir,
}

pub fn harness() -> Harness {
    let (store, dir) = test_store();
    harness_over(store, dir)
}

pub fn harness_over(store: Arc<dyn Storage>, dir: TempDir) -> Harness {
    let cfg = EngineConfig::default();
    let db = db_over(store);
    let deref = Arc::new(FakeDereferencer::new(db.clone()));
    let outbox = Arc::new(RecordingOutbox::default());
    let workers = Arc::new(Workers::new(&cfg));
    let processor = Arc::new(Processor::new(
        &cfg,
        ProcessorParts {
            db: db.clone(),
            workers: workers.clone(),
            dereferencer: deref.clone(),
            outbox: outbox.clone(),
            streams: Streams::default(),
        },
    ));
    Harness {
        processor,
        db,
        deref,
        outbox,
        workers,
        _dir: dir,
    }
}

pub async fn follow(db: &Db, from: &Account, to: &Account) -> Follow {
    let id = seq_id();
    let f = Follow {
        uri: format!("{}/follows/{id}", from.uri),
        id,
        account_id: from.id.clone(),
        target_account_id: to.id.clone(),
        show_reblogs: true,
        notify: false,
        created_at_ms: now_ms(),
    };
    db.put_follow(&f).await.expect("put follow");
    f
}

pub async fn follow_request(db: &Db, from: &Account, to: &Account) -> FollowRequest {
    let id = seq_id();
    let r = FollowRequest {
        uri: format!("{}/follows/{id}", from.uri),
        id,
        account_id: from.id.clone(),
        target_account_id: to.id.clone(),
        show_reblogs: true,
        notify: false,
        created_at_ms: now_ms(),
    };
    db.put_follow_request(&r).await.expect("put follow request");
    r
}

/// Which storage call [`FlakyStore`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    DeleteFollow,
    LocalFollowers,
}

/// Real storage except for one call that always fails.
pub struct FlakyStore {
    inner: Arc<SocialDb>,
    fault: Fault,
}

impl FlakyStore {
    pub fn new(inner: Arc<SocialDb>, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

macro_rules! flaky_store {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        #[async_trait]
        impl Storage for FlakyStore {
            $(
                async fn $name(&self $(, $arg: $ty)*) -> $ret {
                    self.inner.$name($($arg),*).await
                }
            )*

            async fn delete_follow(&self, account_id: &str, target_account_id: &str) -> Result<()> {
                if self.fault == Fault::DeleteFollow {
                    return Err(anyhow::anyhow!("disk on fire"));
                }
                self.inner.delete_follow(account_id, target_account_id).await
            }

            async fn get_account_local_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
                if self.fault == Fault::LocalFollowers {
                    return Err(anyhow::anyhow!("disk on fire"));
                }
                self.inner.get_account_local_followers(account_id).await
            }
        }
    };
}

flaky_store! {
    fn get_account_by_id(&self, id: &str) -> Result<Account>;
    fn get_account_by_uri(&self, uri: &str) -> Result<Account>;
    fn get_account_by_url(&self, url: &str) -> Result<Account>;
    fn put_account(&self, account: &Account) -> Result<()>;
    fn update_account(&self, account: &Account) -> Result<()>;
    fn adjust_account_stats(&self, account_id: &str, delta: StatsDelta) -> Result<()>;
    fn delete_account(&self, id: &str) -> Result<()>;
    fn get_instance_moderators(&self) -> Result<Vec<Account>>;
    fn get_status_by_id(&self, id: &str) -> Result<Status>;
    fn get_status_by_uri(&self, uri: &str) -> Result<Status>;
    fn get_status_boost(&self, boost_of_id: &str, account_id: &str) -> Result<Status>;
    fn get_status_boosts(&self, boost_of_id: &str) -> Result<Vec<Status>>;
    fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>>;
    fn put_status(&self, status: &Status) -> Result<()>;
    fn update_status(&self, status: &Status) -> Result<()>;
    fn delete_status_by_id(&self, id: &str) -> Result<()>;
    fn get_poll_by_id(&self, id: &str) -> Result<Poll>;
    fn put_poll(&self, poll: &Poll) -> Result<()>;
    fn update_poll(&self, poll: &Poll) -> Result<()>;
    fn delete_poll_by_id(&self, id: &str) -> Result<()>;
    fn get_poll_vote(&self, poll_id: &str, account_id: &str) -> Result<PollVote>;
    fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>>;
    fn put_poll_vote(&self, vote: &PollVote) -> Result<()>;
    fn get_follow(&self, account_id: &str, target_account_id: &str) -> Result<Follow>;
    fn put_follow(&self, follow: &Follow) -> Result<()>;
    fn get_account_followers(&self, account_id: &str) -> Result<Vec<Follow>>;
    fn delete_follows_where(&self, filter: &RelationFilter) -> Result<Vec<Follow>>;
    fn get_follow_request(&self, account_id: &str, target_account_id: &str) -> Result<FollowRequest>;
    fn put_follow_request(&self, request: &FollowRequest) -> Result<()>;
    fn accept_follow_request(&self, account_id: &str, target_account_id: &str) -> Result<Follow>;
    fn delete_follow_request(&self, account_id: &str, target_account_id: &str) -> Result<()>;
    fn get_account_follow_requests(&self, target_account_id: &str, page: &Page<String>) -> Result<Vec<FollowRequest>>;
    fn delete_follow_requests_where(&self, filter: &RelationFilter) -> Result<Vec<FollowRequest>>;
    fn get_block(&self, account_id: &str, target_account_id: &str) -> Result<Block>;
    fn put_block(&self, block: &Block) -> Result<()>;
    fn delete_block_by_id(&self, id: &str) -> Result<()>;
    fn get_account_blocks(&self, account_id: &str, page: &Page<String>) -> Result<Vec<Block>>;
    fn delete_blocks_where(&self, filter: &RelationFilter) -> Result<Vec<Block>>;
    fn get_status_fave(&self, account_id: &str, status_id: &str) -> Result<StatusFave>;
    fn get_status_faves(&self, status_id: &str) -> Result<Vec<StatusFave>>;
    fn put_status_fave(&self, fave: &StatusFave) -> Result<()>;
    fn update_status_fave(&self, fave: &StatusFave) -> Result<()>;
    fn delete_status_fave_by_id(&self, id: &str) -> Result<()>;
    fn get_notification(&self, notification_type: NotificationType, target_account_id: &str, origin_account_id: &str, status_id: &str) -> Result<Notification>;
    fn put_notification(&self, notification: &Notification) -> Result<()>;
    fn get_account_notifications(&self, account_id: &str, page: &Page<String>) -> Result<Vec<Notification>>;
    fn delete_notifications_for_status(&self, status_id: &str) -> Result<()>;
    fn delete_notifications_for_account(&self, account_id: &str) -> Result<()>;
    fn get_user_mute(&self, account_id: &str, target_account_id: &str) -> Result<UserMute>;
    fn put_user_mute(&self, mute: &UserMute) -> Result<()>;
    fn delete_user_mute_by_id(&self, id: &str) -> Result<()>;
    fn get_thread_mute(&self, thread_id: &str, account_id: &str) -> Result<ThreadMute>;
    fn put_thread_mute(&self, mute: &ThreadMute) -> Result<()>;
    fn get_interaction_approval_by_id(&self, id: &str) -> Result<InteractionApproval>;
    fn get_interaction_approval_by_uri(&self, uri: &str) -> Result<InteractionApproval>;
    fn put_interaction_approval(&self, approval: &InteractionApproval) -> Result<()>;
    fn get_report_by_id(&self, id: &str) -> Result<Report>;
    fn put_report(&self, report: &Report) -> Result<()>;
    fn get_list_by_id(&self, id: &str) -> Result<List>;
    fn put_list(&self, list: &List) -> Result<()>;
    fn put_list_entry(&self, entry: &ListEntry) -> Result<()>;
    fn get_list_entries_for_follow(&self, follow_id: &str) -> Result<Vec<ListEntry>>;
    fn get_home_timeline(&self, account_id: &str, page: &Page<String>) -> Result<Vec<Status>>;
    fn get_list_timeline(&self, list_id: &str, page: &Page<String>) -> Result<Vec<Status>>;
}
