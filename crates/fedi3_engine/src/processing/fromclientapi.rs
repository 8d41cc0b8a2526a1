/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Handlers for actions local accounts took through the client API. The
//! API has already stored the model; these apply the side effects and
//! send the activity out.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{model, Processor};
use crate::error::{optional, Error};
use crate::federation::Outbound;
use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionType, PollVote, Report, Status, StatusFave,
};
use crate::workers::FromClientApi;

impl Processor {
    /// Sending out is never essential to a client action.
    async fn federate(&self, cancel: &CancellationToken, out: Outbound) {
        let name = out.name();
        if let Err(e) = self.outbox.send(cancel, out).await {
            warn!(activity = name, "federate: {e:#}");
        }
    }

    pub(super) async fn client_create_status(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let status: &Status = model!(msg, Status);
        // Our reply to restricted remote content waits for their Accept
        // before counting, but still goes out.
        if !status.pending_approval {
            self.status_created_stats(status).await;
            if let Some(parent) = &status.in_reply_to_id {
                self.invalidate_status_from_timelines(parent);
            }
            self.timeline_and_notify_status(status)
                .await
                .context("timeline and notify status")?;
        }
        self.federate(cancel, Outbound::CreateStatus(Box::new(status.clone()))).await;
        Ok(())
    }

    pub(super) async fn client_create_poll_vote(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let vote: &PollVote = model!(msg, PollVote);
        let mut poll = self.db.get_poll_by_id(&vote.poll_id).await.context("get poll")?;
        let status = self.db.get_status_by_id(&poll.status_id).await.context("get poll status")?;
        self.invalidate_status_from_timelines(&status.id);
        if status.local {
            poll.increment_votes(&vote.choices);
            self.db.update_poll(&poll).await.context("update poll")?;
            self.federate(cancel, Outbound::UpdateStatus(Box::new(status))).await;
        } else {
            self.federate(cancel, Outbound::PollVote(vote.clone())).await;
        }
        Ok(())
    }

    pub(super) async fn client_create_follow_req(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let req: &FollowRequest = model!(msg, FollowRequest);
        let target = self
            .db
            .get_account_by_id(&req.target_account_id)
            .await
            .context("get follow target")?;
        if target.is_local() {
            return self.handle_follow_request(cancel, req, &target).await;
        }
        self.follow_requests_stats(&target.id, 1).await;
        self.federate(cancel, Outbound::Follow(req.clone())).await;
        Ok(())
    }

    pub(super) async fn client_create_like(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        if !fave.pending_approval {
            self.log_notify("fave", self.notify_fave(fave).await);
        }
        self.invalidate_status_from_timelines(&fave.status_id);
        self.federate(cancel, Outbound::Like(fave.clone())).await;
        Ok(())
    }

    pub(super) async fn client_create_announce(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        if !boost.pending_approval {
            self.status_created_stats(boost).await;
            self.timeline_and_notify_status(boost)
                .await
                .context("timeline and notify boost")?;
            self.log_notify("announce", self.notify_announce(boost).await);
        }
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        self.federate(cancel, Outbound::Announce(Box::new(boost.clone()))).await;
        Ok(())
    }

    pub(super) async fn client_create_block(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let block: &Block = model!(msg, Block);
        let failed = self.block_cleanup(block).await;
        if failed > 0 {
            warn!(%msg, failed, "block cleanup incomplete");
        }
        self.federate(cancel, Outbound::Block(block.clone())).await;
        Ok(())
    }

    pub(super) async fn client_create_flag(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let report: &Report = model!(msg, Report);
        self.log_notify("report", self.notify_report(report).await);
        if report.forwarded {
            self.federate(cancel, Outbound::Flag(report.clone())).await;
        }
        Ok(())
    }

    pub(super) async fn client_update_status(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let status: &Status = model!(msg, Status);
        self.stream_status_edit(status);
        self.log_notify("status edit", self.notify_status_edit(status).await);
        self.federate(cancel, Outbound::UpdateStatus(Box::new(status.clone()))).await;
        Ok(())
    }

    pub(super) async fn client_update_account(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let account: &Account = model!(msg, Account);
        self.federate(cancel, Outbound::UpdateAccount(Box::new(account.clone()))).await;
        Ok(())
    }

    pub(super) async fn client_accept_follow(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let req: &FollowRequest = model!(msg, FollowRequest);
        let follow = self
            .db
            .accept_follow_request(&req.account_id, &req.target_account_id)
            .await
            .context("accept follow request")?;
        self.follow_requests_stats(&req.target_account_id, -1).await;
        self.follow_added_stats(&follow).await;
        self.log_notify("follow", self.notify_follow(&follow).await);
        self.federate(cancel, Outbound::AcceptFollow(follow)).await;
        Ok(())
    }

    pub(super) async fn client_accept_like(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        let mut fave = self
            .db
            .get_status_fave(&fave.account_id, &fave.status_id)
            .await
            .context("get fave")?;
        if !fave.pending_approval {
            return Ok(());
        }
        self.approve_fave(cancel, &mut fave).await?;
        self.log_notify("fave", self.notify_fave(&fave).await);
        self.invalidate_status_from_timelines(&fave.status_id);
        Ok(())
    }

    pub(super) async fn client_accept_reply(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let reply: &Status = model!(msg, Status);
        let mut reply = self.db.get_status_by_id(&reply.id).await.context("get reply")?;
        if !reply.pending_approval {
            return Ok(());
        }
        self.approve_reply(cancel, &mut reply).await?;
        self.status_created_stats(&reply).await;
        if let Some(parent) = &reply.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        self.timeline_and_notify_status(&reply)
            .await
            .context("timeline and notify reply")
    }

    pub(super) async fn client_accept_announce(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        let mut boost = self.db.get_status_by_id(&boost.id).await.context("get boost")?;
        if !boost.pending_approval {
            return Ok(());
        }
        self.approve_announce(cancel, &mut boost).await?;
        self.status_created_stats(&boost).await;
        self.timeline_and_notify_status(&boost)
            .await
            .context("timeline and notify boost")?;
        self.log_notify("announce", self.notify_announce(&boost).await);
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        Ok(())
    }

    pub(super) async fn client_reject_follow(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let req: &FollowRequest = model!(msg, FollowRequest);
        self.remove_follow_request(&req.account_id, &req.target_account_id)
            .await?;
        self.federate(cancel, Outbound::RejectFollow(req.clone())).await;
        Ok(())
    }

    pub(super) async fn client_reject_like(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        if let Some(stored) = optional(self.db.get_status_fave(&fave.account_id, &fave.status_id).await)? {
            self.db.delete_status_fave(&stored).await.context("delete fave")?;
        }
        let rejection = self.rejection(
            &msg.origin.username,
            &msg.origin.id,
            &fave.account_id,
            &fave.uri,
            InteractionType::Like,
        );
        self.federate(cancel, Outbound::RejectInteraction(rejection)).await;
        Ok(())
    }

    pub(super) async fn client_reject_reply(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let reply: &Status = model!(msg, Status);
        self.reject_pending_status(cancel, &msg, reply, InteractionType::Reply)
            .await
    }

    pub(super) async fn client_reject_announce(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        self.reject_pending_status(cancel, &msg, boost, InteractionType::Announce)
            .await
    }

    async fn reject_pending_status(
        &self,
        cancel: &CancellationToken,
        msg: &FromClientApi,
        status: &Status,
        kind: InteractionType,
    ) -> Result<()> {
        let rejection = self.rejection(
            &msg.origin.username,
            &msg.origin.id,
            &status.account_id,
            &status.uri,
            kind,
        );
        if let Some(stored) = optional(self.db.get_status_by_id(&status.id).await)? {
            if !stored.pending_approval {
                return Err(Error::InvalidMessage(format!("{msg}: {} is not pending", stored.uri)).into());
            }
            self.workers.purge(&[stored.id.as_str(), stored.uri.as_str()]);
            self.wipe_status(&stored).await.context("wipe rejected status")?;
        }
        self.federate(cancel, Outbound::RejectInteraction(rejection)).await;
        Ok(())
    }

    pub(super) async fn client_undo_follow(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let follow: &Follow = model!(msg, Follow);
        let removed_request = self
            .remove_follow_request(&follow.account_id, &follow.target_account_id)
            .await?;
        let removed = self
            .remove_follow(&follow.account_id, &follow.target_account_id)
            .await?;
        debug!(%msg, removed_request, removed = removed.is_some(), "unfollowed");
        self.federate(cancel, Outbound::UndoFollow(follow.clone())).await;
        Ok(())
    }

    pub(super) async fn client_undo_block(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let block: &Block = model!(msg, Block);
        if let Some(stored) = optional(self.db.get_block(&block.account_id, &block.target_account_id).await)? {
            self.db.delete_block(&stored).await.context("delete block")?;
        }
        self.federate(cancel, Outbound::UndoBlock(block.clone())).await;
        Ok(())
    }

    pub(super) async fn client_undo_like(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        if let Some(stored) = optional(self.db.get_status_fave(&fave.account_id, &fave.status_id).await)? {
            self.db.delete_status_fave(&stored).await.context("delete fave")?;
        }
        self.invalidate_status_from_timelines(&fave.status_id);
        self.federate(cancel, Outbound::UndoLike(fave.clone())).await;
        Ok(())
    }

    pub(super) async fn client_undo_announce(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        self.workers.purge(&[boost.id.as_str(), boost.uri.as_str()]);
        if let Some(stored) = optional(self.db.get_status_by_id(&boost.id).await)? {
            self.wipe_status(&stored).await.context("wipe boost")?;
            if !stored.pending_approval {
                self.status_removed_stats(&stored).await;
            }
        }
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        self.federate(cancel, Outbound::UndoAnnounce(Box::new(boost.clone()))).await;
        Ok(())
    }

    pub(super) async fn client_delete_status(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let status: &Status = model!(msg, Status);
        let purged = self
            .workers
            .purge(&[status.id.as_str(), status.uri.as_str()]);
        debug!(%msg, purged, "purged queued work");

        // Rendered before the rows it addresses are gone.
        self.federate(cancel, Outbound::DeleteStatus(Box::new(status.clone()))).await;
        if let Some(stored) = optional(self.db.get_status_by_id(&status.id).await)? {
            self.wipe_status(&stored).await.context("wipe status")?;
            if !stored.pending_approval {
                self.status_removed_stats(&stored).await;
            }
        }
        if let Some(parent) = &status.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        Ok(())
    }

    pub(super) async fn client_delete_account(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        // Moderators delete others; everyone else deletes themselves.
        let account = msg.target.clone().unwrap_or_else(|| msg.origin.clone());
        if account.id != msg.origin.id && !msg.origin.moderator {
            return Err(Error::NotPermitted(format!("{msg}: not a moderator")).into());
        }
        let purged = self
            .workers
            .purge(&[account.id.as_str(), account.uri.as_str()]);
        debug!(%msg, purged, "purged queued work");

        if account.is_local() {
            self.federate(cancel, Outbound::DeleteAccount(Box::new((*account).clone()))).await;
        }
        self.delete_account_content(&account.id).await
    }

    pub(super) async fn client_move_account(&self, cancel: &CancellationToken, msg: FromClientApi) -> Result<()> {
        let target_uri = msg
            .target_uri
            .clone()
            .or_else(|| msg.target.as_ref().map(|t| t.uri.clone()))
            .ok_or_else(|| Error::InvalidMessage(format!("{msg}: move without target")))?;
        self.move_account(cancel, &msg.origin.username, &msg.origin, &target_uri)
            .await?;
        let origin = self
            .db
            .get_account_by_id(&msg.origin.id)
            .await
            .context("get moved account")?;
        if origin.moved_to_uri.as_deref() == Some(target_uri.as_str()) {
            self.federate(cancel, Outbound::MoveAccount(Box::new(origin))).await;
        }
        Ok(())
    }
}
