/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use tracing::trace;

use crate::cache::index::ITEM_TYPE_REQUESTER_ITEM;
use crate::cache::{CachedVisibility, DecisionItem, ANONYMOUS};
use crate::db::Db;
use crate::error::optional;
use crate::model::{Account, Status, Visibility};

#[derive(Clone)]
pub struct VisibilityFilter {
    db: Db,
}

impl VisibilityFilter {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Whether `requester` (or an unauthenticated viewer) may see `status`.
    pub async fn status_visible(&self, requester: Option<&Account>, status: &Status) -> Result<bool> {
        let item = DecisionItem::Status;
        let requester_key = requester.map_or(ANONYMOUS, |a| a.id.as_str());
        let decision = self
            .db
            .caches()
            .visibility
            .load(
                ITEM_TYPE_REQUESTER_ITEM,
                &[item.as_str(), requester_key, &status.id],
                || async {
                    let value = self.compute_visible(requester, status).await?;
                    Ok(CachedVisibility {
                        item_type: item,
                        requester_id: requester.map(|a| a.id.clone()).unwrap_or_default(),
                        item_id: status.id.clone(),
                        value,
                    })
                },
            )
            .await
            .context("status visibility")?;
        Ok(decision.value)
    }

    /// Whether `status` belongs on `owner`'s home timeline.
    pub async fn status_home_timelineable(&self, owner: &Account, status: &Status) -> Result<bool> {
        let item = DecisionItem::HomeStatus;
        let decision = self
            .db
            .caches()
            .visibility
            .load(
                ITEM_TYPE_REQUESTER_ITEM,
                &[item.as_str(), &owner.id, &status.id],
                || async {
                    let value = self.compute_home_timelineable(owner, status).await?;
                    Ok(CachedVisibility {
                        item_type: item,
                        requester_id: owner.id.clone(),
                        item_id: status.id.clone(),
                        value,
                    })
                },
            )
            .await
            .context("home timeline visibility")?;
        Ok(decision.value)
    }

    /// Public timelines carry neither boosts nor replies that mention
    /// someone.
    pub async fn status_public_timelineable(
        &self,
        requester: Option<&Account>,
        status: &Status,
    ) -> Result<bool> {
        if status.is_boost() {
            return Ok(false);
        }
        if status.is_reply() && !status.mention_account_ids.is_empty() {
            return Ok(false);
        }
        if status.visibility != Visibility::Public {
            return Ok(false);
        }
        if requester.map_or(false, |r| r.id == status.account_id) {
            return Ok(true);
        }
        self.status_visible(requester, status).await
    }

    async fn compute_visible(&self, requester: Option<&Account>, status: &Status) -> Result<bool> {
        if !self.visible_alone(requester, status).await? {
            return Ok(false);
        }
        // A boost is only as visible as what it boosts.
        if let Some(boost_of_id) = &status.boost_of_id {
            let Some(original) = optional(self.db.get_status_by_id(boost_of_id).await)? else {
                return Ok(false);
            };
            return self.visible_alone(requester, &original).await;
        }
        Ok(true)
    }

    async fn visible_alone(&self, requester: Option<&Account>, status: &Status) -> Result<bool> {
        if status.pending_approval {
            // Only the two parties of an unapproved interaction see it.
            return Ok(requester.map_or(false, |r| {
                r.id == status.account_id
                    || status.in_reply_to_account_id.as_deref() == Some(r.id.as_str())
                    || status.boost_of_account_id.as_deref() == Some(r.id.as_str())
            }));
        }

        let author = match optional(self.db.get_account_by_id(&status.account_id).await)? {
            Some(a) => a,
            None => {
                trace!(status = %status.id, "author missing, not visible");
                return Ok(false);
            }
        };
        if author.suspended_at_ms.is_some() {
            return Ok(false);
        }

        let Some(requester) = requester else {
            return Ok(matches!(
                status.visibility,
                Visibility::Public | Visibility::Unlisted
            ));
        };

        if requester.id == status.account_id {
            return Ok(true);
        }

        if self.db.is_either_blocked(&requester.id, &status.account_id).await? {
            return Ok(false);
        }

        Ok(match status.visibility {
            Visibility::Public | Visibility::Unlisted => true,
            Visibility::FollowersOnly => {
                status.mentions(&requester.id)
                    || self.db.is_following(&requester.id, &status.account_id).await?
            }
            Visibility::Direct => status.mentions(&requester.id),
        })
    }

    async fn compute_home_timelineable(&self, owner: &Account, status: &Status) -> Result<bool> {
        if !self.status_visible(Some(owner), status).await? {
            return Ok(false);
        }
        if status.account_id == owner.id {
            return Ok(true);
        }
        if status.mentions(&owner.id) {
            return Ok(true);
        }
        if status.visibility == Visibility::Direct {
            return Ok(false);
        }

        let follow = optional(self.db.get_follow(&owner.id, &status.account_id).await)?;
        let Some(follow) = follow else {
            return Ok(false);
        };
        if status.is_boost() && !follow.show_reblogs {
            return Ok(false);
        }

        // Replies only show when the owner follows whoever is replied to,
        // or the author is talking to themselves.
        if let Some(parent_author) = &status.in_reply_to_account_id {
            if parent_author != &status.account_id
                && parent_author != &owner.id
                && !self.db.is_following(&owner.id, parent_author).await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Follow};
    use crate::testutil::{local_account, remote_account, status_by, test_db};
    use crate::util::{new_id, now_ms};

    fn follow(from: &Account, to: &Account) -> Follow {
        Follow {
            id: new_id(),
            uri: format!("{}/follows/{}", from.uri, new_id()),
            account_id: from.id.clone(),
            target_account_id: to.id.clone(),
            show_reblogs: true,
            notify: false,
            created_at_ms: now_ms(),
        }
    }

    #[tokio::test]
    async fn followers_only_needs_a_follow_and_drops_cached_no() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let mut status = status_by(&db, &author).await;
        status.visibility = Visibility::FollowersOnly;
        db.update_status(&status).await.unwrap();
        let filter = VisibilityFilter::new(db.clone());

        assert!(!filter.status_visible(Some(&me), &status).await.unwrap());
        assert!(!filter.status_visible(None, &status).await.unwrap());

        db.put_follow(&follow(&me, &author)).await.unwrap();
        assert!(filter.status_visible(Some(&me), &status).await.unwrap());
        assert!(filter.status_home_timelineable(&me, &status).await.unwrap());
    }

    #[tokio::test]
    async fn blocks_hide_in_both_directions() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let status = status_by(&db, &author).await;
        let filter = VisibilityFilter::new(db.clone());

        assert!(filter.status_visible(Some(&me), &status).await.unwrap());
        let block = Block {
            id: new_id(),
            uri: format!("{}/blocks/1", author.uri),
            account_id: author.id.clone(),
            target_account_id: me.id.clone(),
            created_at_ms: now_ms(),
        };
        db.put_block(&block).await.unwrap();
        assert!(!filter.status_visible(Some(&me), &status).await.unwrap());

        db.delete_block(&block).await.unwrap();
        assert!(filter.status_visible(Some(&me), &status).await.unwrap());
    }

    #[tokio::test]
    async fn pending_replies_are_seen_by_the_parties_only() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let other = local_account(&db, "other").await;
        let author = remote_account(&db, "author", "remote.test").await;
        let mut reply = status_by(&db, &author).await;
        reply.pending_approval = true;
        reply.in_reply_to_account_id = Some(me.id.clone());
        let filter = VisibilityFilter::new(db.clone());

        assert!(filter.status_visible(Some(&me), &reply).await.unwrap());
        assert!(filter.status_visible(Some(&author), &reply).await.unwrap());
        assert!(!filter.status_visible(Some(&other), &reply).await.unwrap());
        assert!(!filter.status_visible(None, &reply).await.unwrap());
    }

    #[tokio::test]
    async fn home_timeline_skips_strangers_and_replies_to_strangers() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let friend = remote_account(&db, "friend", "remote.test").await;
        let stranger = remote_account(&db, "stranger", "remote.test").await;
        db.put_follow(&follow(&me, &friend)).await.unwrap();
        let filter = VisibilityFilter::new(db.clone());

        let stranger_post = status_by(&db, &stranger).await;
        assert!(!filter.status_home_timelineable(&me, &stranger_post).await.unwrap());

        let mut reply = status_by(&db, &friend).await;
        reply.in_reply_to_id = Some(stranger_post.id.clone());
        reply.in_reply_to_account_id = Some(stranger.id.clone());
        assert!(!filter.status_home_timelineable(&me, &reply).await.unwrap());

        let own = status_by(&db, &friend).await;
        assert!(filter.status_home_timelineable(&me, &own).await.unwrap());
    }
}
