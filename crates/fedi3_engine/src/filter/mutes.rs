/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};

use crate::cache::index::TYPE_REQUESTER_ITEM;
use crate::cache::{CachedMute, DecisionItem};
use crate::db::Db;
use crate::error::optional;
use crate::model::{Account, Status, UserMute};
use crate::util::now_ms;

#[derive(Clone)]
pub struct MuteFilter {
    db: Db,
}

/// Running union of several mutes. An expiry of `None` on a live mute
/// means it never lapses, which beats any dated one.
#[derive(Default)]
struct Expiry {
    any: bool,
    forever: bool,
    latest: Option<i64>,
}

impl Expiry {
    fn add(&mut self, expires_at_ms: Option<i64>) {
        self.any = true;
        match expires_at_ms {
            None => self.forever = true,
            Some(at) => self.latest = Some(self.latest.map_or(at, |l| l.max(at))),
        }
    }

    fn get(&self) -> Option<i64> {
        if self.forever {
            None
        } else {
            self.latest
        }
    }
}

impl MuteFilter {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Whether `status` is hidden from `requester` by a mute on its author
    /// or on an account it mentions.
    pub async fn status_muted(&self, requester: Option<&Account>, status: &Status) -> Result<bool> {
        let Some(requester) = requester else {
            return Ok(false);
        };
        let details = self.status_details(requester, status).await?;
        Ok(details.muted_at(now_ms()))
    }

    /// Whether notifications about `status` are suppressed for `requester`.
    /// Thread mutes only ever suppress notifications.
    pub async fn status_notifications_muted(
        &self,
        requester: Option<&Account>,
        status: &Status,
    ) -> Result<bool> {
        let Some(requester) = requester else {
            return Ok(false);
        };
        let details = self.status_details(requester, status).await?;
        Ok(details.notifications_muted_at(now_ms()))
    }

    pub async fn account_muted(&self, requester: Option<&Account>, account: &Account) -> Result<bool> {
        let Some(requester) = requester else {
            return Ok(false);
        };
        let details = self.account_details(requester, account).await?;
        Ok(details.muted_at(now_ms()))
    }

    pub async fn account_notifications_muted(
        &self,
        requester: Option<&Account>,
        account: &Account,
    ) -> Result<bool> {
        let Some(requester) = requester else {
            return Ok(false);
        };
        let details = self.account_details(requester, account).await?;
        Ok(details.notifications_muted_at(now_ms()))
    }

    async fn status_details(&self, requester: &Account, status: &Status) -> Result<CachedMute> {
        let item = DecisionItem::Status;
        self.db
            .caches()
            .mutes
            .load(
                TYPE_REQUESTER_ITEM,
                &[item.as_str(), &requester.id, &status.id],
                || async {
                    let now = now_ms();
                    let mut details = CachedMute::unmuted(item, &requester.id, &status.id);

                    if !status.thread_id.is_empty() {
                        let thread_mute = optional(
                            self.db.get_thread_mute(&status.thread_id, &requester.id).await,
                        )
                        .context("get thread mute")?;
                        details.notifications = thread_mute.is_some();
                    }

                    let mut mute = Expiry::default();
                    let mut notify = Expiry::default();
                    for m in self.related_user_mutes(requester, status).await? {
                        if m.expired(now) {
                            continue;
                        }
                        mute.add(m.expires_at_ms);
                        if m.notifications {
                            notify.add(m.expires_at_ms);
                        }
                    }

                    details.mute = mute.any;
                    details.mute_expiry = mute.get();
                    // A thread mute never expires.
                    if notify.any && !details.notifications {
                        details.notifications = true;
                        details.notification_expiry = notify.get();
                    }
                    Ok(details)
                },
            )
            .await
            .context("status mute details")
    }

    /// User mutes the requester holds against the author and every
    /// mentioned account, excluding itself.
    async fn related_user_mutes(&self, requester: &Account, status: &Status) -> Result<Vec<UserMute>> {
        if status.account_id == requester.id {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(1 + status.mention_account_ids.len());
        let targets = std::iter::once(&status.account_id).chain(
            status
                .mention_account_ids
                .iter()
                .filter(|id| **id != requester.id),
        );
        for target in targets {
            if let Some(m) = optional(self.db.get_user_mute(&requester.id, target).await)
                .context("get user mute")?
            {
                out.push(m);
            }
        }
        Ok(out)
    }

    async fn account_details(&self, requester: &Account, account: &Account) -> Result<CachedMute> {
        let item = DecisionItem::Account;
        self.db
            .caches()
            .mutes
            .load(
                TYPE_REQUESTER_ITEM,
                &[item.as_str(), &requester.id, &account.id],
                || async {
                    let mut details = CachedMute::unmuted(item, &requester.id, &account.id);
                    if requester.id == account.id {
                        return Ok(details);
                    }
                    let mute = optional(self.db.get_user_mute(&requester.id, &account.id).await)
                        .context("get user mute")?;
                    if let Some(m) = mute.filter(|m| !m.expired(now_ms())) {
                        details.mute = true;
                        details.mute_expiry = m.expires_at_ms;
                        details.notifications = m.notifications;
                        details.notification_expiry = m.expires_at_ms.filter(|_| m.notifications);
                    }
                    Ok(details)
                },
            )
            .await
            .context("account mute details")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThreadMute;
    use crate::testutil::{local_account, remote_account, status_by, test_db};
    use crate::util::new_id;

    fn user_mute(requester: &Account, target: &Account, notifications: bool, expires: Option<i64>) -> UserMute {
        UserMute {
            id: new_id(),
            account_id: requester.id.clone(),
            target_account_id: target.id.clone(),
            notifications,
            expires_at_ms: expires,
            created_at_ms: now_ms(),
        }
    }

    #[tokio::test]
    async fn muting_the_author_mutes_the_status() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let status = status_by(&db, &author).await;
        let filter = MuteFilter::new(db.clone());

        assert!(!filter.status_muted(Some(&me), &status).await.unwrap());

        db.put_user_mute(&user_mute(&me, &author, false, None)).await.unwrap();
        assert!(filter.status_muted(Some(&me), &status).await.unwrap());
        assert!(!filter.status_notifications_muted(Some(&me), &status).await.unwrap());
        assert!(filter.account_muted(Some(&me), &author).await.unwrap());
        assert!(!filter.status_muted(None, &status).await.unwrap());
    }

    #[tokio::test]
    async fn expiry_is_checked_on_cache_hits() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let status = status_by(&db, &author).await;
        let filter = MuteFilter::new(db.clone());

        let expires = now_ms() + 500;
        db.put_user_mute(&user_mute(&me, &author, true, Some(expires))).await.unwrap();
        assert!(filter.status_muted(Some(&me), &status).await.unwrap());
        assert!(filter.status_notifications_muted(Some(&me), &status).await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        // The decision is still cached, but the mute itself has lapsed.
        assert!(!filter.status_muted(Some(&me), &status).await.unwrap());
        assert!(!filter.account_notifications_muted(Some(&me), &author).await.unwrap());
    }

    #[tokio::test]
    async fn thread_mute_only_silences_notifications() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let status = status_by(&db, &author).await;
        let filter = MuteFilter::new(db.clone());

        assert!(!filter.status_notifications_muted(Some(&me), &status).await.unwrap());
        db.put_thread_mute(&ThreadMute {
            id: new_id(),
            thread_id: status.thread_id.clone(),
            account_id: me.id.clone(),
            created_at_ms: now_ms(),
        })
        .await
        .unwrap();
        assert!(filter.status_notifications_muted(Some(&me), &status).await.unwrap());
        assert!(!filter.status_muted(Some(&me), &status).await.unwrap());
    }
}
