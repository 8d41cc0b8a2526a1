/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Account moves. The origin account points at its new home, and local
//! followers of the origin are moved over to follow the target.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{benign, Processor};
use crate::error::{is_already_exists, optional, Error};
use crate::federation::Outbound;
use crate::model::{Account, FollowRequest};
use crate::util::{new_id, now_ms};

impl Processor {
    pub(crate) async fn move_account(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        origin: &Account,
        target_uri: &str,
    ) -> Result<()> {
        if target_uri == origin.uri {
            return Err(Error::InvalidMessage(format!("{} cannot move to itself", origin.uri)).into());
        }

        let target = match self
            .federation
            .get_account_by_uri(cancel, requesting_username, target_uri, true)
            .await
        {
            Ok(a) => a,
            Err(e) if benign(&e) => {
                debug!(origin = %origin.uri, target = target_uri, "skipping move: {e:#}");
                return Ok(());
            }
            Err(e) => return Err(e.context("get move target")),
        };
        if !target.also_known_as.iter().any(|aka| aka == &origin.uri) {
            return Err(Error::NotPermitted(format!(
                "{} does not list {} as an alias",
                target.uri, origin.uri
            ))
            .into());
        }

        let mut origin = self
            .db
            .get_account_by_id(&origin.id)
            .await
            .context("get move origin")?;
        let first_time = origin.moved_to_uri.as_deref() != Some(target.uri.as_str());
        if first_time {
            origin.moved_to_uri = Some(target.uri.clone());
            origin.updated_at_ms = now_ms();
            self.db.update_account(&origin).await.context("update origin")?;
            info!(origin = %origin.uri, target = %target.uri, "account moved");
        }

        // Repeating the move picks up followers missed the first time.
        let mut moved = 0;
        for follow in self.db.get_account_local_followers(&origin.id).await? {
            match self.move_follower(cancel, &follow.account_id, &origin, &target).await {
                Ok(true) => moved += 1,
                Ok(false) => {}
                Err(e) => warn!(follower = %follow.account_id, "move follower: {e:#}"),
            }
        }
        debug!(origin = %origin.uri, moved, "followers moved");
        Ok(())
    }

    /// Asks the target for a follow on the follower's behalf and drops the
    /// follow of the origin. False when the follower already follows or
    /// has asked to follow the target.
    async fn move_follower(
        &self,
        cancel: &CancellationToken,
        follower_id: &str,
        origin: &Account,
        target: &Account,
    ) -> Result<bool> {
        let follower = self.db.get_account_by_id(follower_id).await?;
        let already = self.db.is_following(follower_id, &target.id).await?
            || optional(self.db.get_follow_request(follower_id, &target.id).await)?.is_some();

        if !already && follower.id != target.id {
            let id = new_id();
            let req = FollowRequest {
                uri: format!("{}/follow/{}", follower.uri, id),
                id,
                account_id: follower.id.clone(),
                target_account_id: target.id.clone(),
                show_reblogs: true,
                notify: false,
                created_at_ms: now_ms(),
            };
            match self.db.put_follow_request(&req).await {
                Ok(()) => {}
                Err(e) if is_already_exists(&e) => return Ok(false),
                Err(e) => return Err(e.context("put follow request")),
            }
            if target.is_local() {
                self.handle_follow_request(cancel, &req, target).await?;
            } else {
                self.follow_requests_stats(&target.id, 1).await;
                if let Err(e) = self.outbox.send(cancel, Outbound::Follow(req)).await {
                    warn!(follower = %follower.uri, "federate follow: {e:#}");
                }
            }
        }

        if let Some(old) = self.remove_follow(follower_id, &origin.id).await? {
            if origin.is_remote() {
                if let Err(e) = self.outbox.send(cancel, Outbound::UndoFollow(old)).await {
                    warn!(follower = %follower.uri, "federate unfollow: {e:#}");
                }
            }
        }
        Ok(!already)
    }
}
