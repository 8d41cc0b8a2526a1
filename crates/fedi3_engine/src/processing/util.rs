/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::Processor;
use crate::error::optional;
use crate::model::{Block, Follow, RelationFilter, StatsDelta, Status};
use crate::stream::{StreamEvent, StreamKind};

impl Processor {
    /// Counter updates never abort a handler.
    pub(crate) async fn adjust_stats(&self, account_id: &str, delta: StatsDelta) {
        if let Err(e) = self.db.adjust_account_stats(account_id, delta).await {
            warn!(account = account_id, ?delta, "adjust account stats: {e:#}");
        }
    }

    pub(crate) async fn status_created_stats(&self, status: &Status) {
        self.adjust_stats(
            &status.account_id,
            StatsDelta {
                statuses: 1,
                last_status_at_ms: Some(status.created_at_ms),
                ..Default::default()
            },
        )
        .await;
    }

    pub(crate) async fn status_removed_stats(&self, status: &Status) {
        self.adjust_stats(
            &status.account_id,
            StatsDelta {
                statuses: -1,
                ..Default::default()
            },
        )
        .await;
    }

    /// Counters for a follow that now exists.
    pub(crate) async fn follow_added_stats(&self, follow: &Follow) {
        self.adjust_stats(
            &follow.account_id,
            StatsDelta {
                following: 1,
                ..Default::default()
            },
        )
        .await;
        self.adjust_stats(
            &follow.target_account_id,
            StatsDelta {
                followers: 1,
                ..Default::default()
            },
        )
        .await;
    }

    pub(crate) async fn follow_removed_stats(&self, follow: &Follow) {
        self.adjust_stats(
            &follow.account_id,
            StatsDelta {
                following: -1,
                ..Default::default()
            },
        )
        .await;
        self.adjust_stats(
            &follow.target_account_id,
            StatsDelta {
                followers: -1,
                ..Default::default()
            },
        )
        .await;
    }

    pub(crate) async fn follow_requests_stats(&self, target_account_id: &str, by: i64) {
        self.adjust_stats(
            target_account_id,
            StatsDelta {
                follow_requests: by,
                ..Default::default()
            },
        )
        .await;
    }

    /// Drops a status and everything hanging off it: notifications, faves,
    /// boosts, its poll, and its timeline entries. Counters are left to the
    /// caller. A status already gone is not an error.
    pub(crate) async fn wipe_status(&self, status: &Status) -> Result<()> {
        for boost in self.db.get_status_boosts(&status.id).await? {
            self.remove_status_everywhere(&boost).await?;
            self.status_removed_stats(&boost).await;
        }
        for fave in self.db.get_status_faves(&status.id).await? {
            self.db.delete_status_fave(&fave).await?;
        }
        if let Some(poll_id) = &status.poll_id {
            if let Err(e) = self.db.delete_poll_by_id(poll_id).await {
                warn!(status = %status.uri, poll = %poll_id, "delete poll: {e:#}");
            }
        }
        self.remove_status_everywhere(status).await
    }

    async fn remove_status_everywhere(&self, status: &Status) -> Result<()> {
        self.db
            .delete_notifications_for_status(&status.id)
            .await
            .context("delete notifications")?;
        match optional(self.db.delete_status_by_id(&status.id).await)? {
            Some(()) => debug!(status = %status.uri, "status deleted"),
            None => debug!(status = %status.uri, "status already gone"),
        }

        let owners = self.home.owners_of(&status.id);
        self.home.remove_by_status_ids(&[&status.id]);
        self.lists.remove_by_status_ids(&[&status.id]);
        for owner in owners {
            self.streams
                .send(StreamEvent::new(StreamKind::Delete, &owner, "user", &status.id));
        }
        Ok(())
    }

    /// Removes `account_id`'s follow of `target_account_id` if there is one,
    /// along with the followed account's items in the follower's home and
    /// list timelines.
    pub(crate) async fn remove_follow(&self, account_id: &str, target_account_id: &str) -> Result<Option<Follow>> {
        let Some(follow) = optional(self.db.get_follow(account_id, target_account_id).await)? else {
            return Ok(None);
        };
        for entry in self.db.get_list_entries_for_follow(&follow.id).await? {
            self.lists
                .wipe_items_from_account_id(&entry.list_id, target_account_id);
        }
        self.db
            .delete_follow(account_id, target_account_id)
            .await
            .context("delete follow")?;
        self.home.wipe_items_from_account_id(account_id, target_account_id);
        self.follow_removed_stats(&follow).await;
        Ok(Some(follow))
    }

    /// Removes a pending follow request if there is one.
    pub(crate) async fn remove_follow_request(&self, account_id: &str, target_account_id: &str) -> Result<bool> {
        if optional(self.db.get_follow_request(account_id, target_account_id).await)?.is_none() {
            return Ok(false);
        }
        self.db
            .delete_follow_request(account_id, target_account_id)
            .await
            .context("delete follow request")?;
        self.follow_requests_stats(target_account_id, -1).await;
        Ok(true)
    }

    /// Tears down everything between the two parties of a block. Each step
    /// runs regardless of the others; failures are logged and counted.
    pub(crate) async fn block_cleanup(&self, block: &Block) -> usize {
        let (a, b) = (block.account_id.as_str(), block.target_account_id.as_str());
        let mut failed = 0;

        let wiped = self.home.wipe_items_from_account_id(a, b)
            + self.home.wipe_items_from_account_id(b, a);
        debug!(blocker = a, blocked = b, wiped, "timelines wiped for block");

        for (from, to) in [(a, b), (b, a)] {
            if let Err(e) = self.remove_follow(from, to).await {
                warn!(from, to, "block: remove follow: {e:#}");
                failed += 1;
            }
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Err(e) = self.remove_follow_request(from, to).await {
                warn!(from, to, "block: remove follow request: {e:#}");
                failed += 1;
            }
        }
        failed
    }

    /// Deletes an account's content and relationships, then the account.
    pub(crate) async fn delete_account_content(&self, account_id: &str) -> Result<()> {
        let mut follows = self
            .db
            .delete_follows_where(&RelationFilter::from_account(account_id))
            .await?;
        follows.extend(
            self.db
                .delete_follows_where(&RelationFilter::targeting(account_id))
                .await?,
        );
        for f in follows {
            // The deleted side's own counters go with it.
            if f.account_id == account_id {
                self.adjust_stats(
                    &f.target_account_id,
                    StatsDelta {
                        followers: -1,
                        ..Default::default()
                    },
                )
                .await;
            } else {
                self.adjust_stats(
                    &f.account_id,
                    StatsDelta {
                        following: -1,
                        ..Default::default()
                    },
                )
                .await;
                self.home.wipe_items_from_account_id(&f.account_id, account_id);
            }
        }
        for r in self
            .db
            .delete_follow_requests_where(&RelationFilter::from_account(account_id))
            .await?
        {
            self.follow_requests_stats(&r.target_account_id, -1).await;
        }
        self.db
            .delete_follow_requests_where(&RelationFilter::targeting(account_id))
            .await?;
        self.db
            .delete_blocks_where(&RelationFilter::from_account(account_id))
            .await?;
        self.db
            .delete_blocks_where(&RelationFilter::targeting(account_id))
            .await?;

        for id in self.db.get_account_status_ids(account_id).await? {
            if let Some(status) = optional(self.db.get_status_by_id(&id).await)? {
                if let Err(e) = self.wipe_status(&status).await {
                    warn!(status = %status.uri, "delete account: wipe status: {e:#}");
                }
            }
        }
        self.db.delete_notifications_for_account(account_id).await?;
        self.home.remove_timeline(account_id);
        self.db
            .delete_account(account_id)
            .await
            .context("delete account")
    }
}
