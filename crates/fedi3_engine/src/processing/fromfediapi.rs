/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Handlers for activities delivered by remote servers.
//!
//! Creation handlers are written to be run more than once for the same
//! object: a row that already exists means an earlier delivery got there
//! first and the handler stops with success.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::approval::ApprovalState;
use super::{benign, model, Processor};
use crate::error::{is_already_exists, is_not_found, optional, Error};
use crate::federation::Outbound;
use crate::model::{Account, Block, Follow, FollowRequest, PollVote, Report, Status, StatusFave};
use crate::workers::FromFediApi;

impl Processor {
    pub(super) async fn fedi_create_status(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let username = msg.receiving.username.as_str();
        let resolved = match (&msg.model, &msg.ap_iri) {
            (Some(crate::workers::Model::Status(existing)), None) => {
                self.federation
                    .refresh_status(cancel, username, existing, msg.ap_object.as_ref(), self.fresh)
                    .await
            }
            (None, Some(iri)) => self.federation.get_status_by_uri(cancel, username, iri).await,
            _ => {
                return Err(Error::InvalidMessage(format!(
                    "{msg}: need exactly one of a status or an iri"
                ))
                .into())
            }
        };
        let mut status = match resolved {
            Ok(Some(s)) => s,
            Ok(None) => {
                debug!(%msg, "status already handled");
                return Ok(());
            }
            Err(e) if benign(&e) => {
                debug!(%msg, "skipping status: {e:#}");
                return Ok(());
            }
            Err(e) => return Err(e.context("dereference status")),
        };

        if status.in_reply_to_id.is_some() {
            match ApprovalState::of_status(&status) {
                ApprovalState::PendingApproval => {
                    self.log_notify("pending reply", self.notify_pending_reply(&status).await);
                    return Ok(());
                }
                ApprovalState::PreApproved => {
                    self.approve_reply(cancel, &mut status)
                        .await
                        .context("approve reply")?;
                }
                ApprovalState::Open => {}
            }
        }

        // The row is stored, so a retry would stop at "already handled".
        self.status_created_stats(&status).await;
        if let Some(parent) = &status.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        if let Err(e) = self.timeline_and_notify_status(&status).await {
            error!(%msg, "timeline and notify status: {e:#}");
        }
        Ok(())
    }

    pub(super) async fn fedi_create_poll_vote(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let vote: &PollVote = model!(msg, PollVote);
        match self.db.put_poll_vote(vote).await {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => {
                debug!(%msg, "vote already stored");
                return Ok(());
            }
            Err(e) => return Err(e.context("put poll vote")),
        }

        let mut poll = self.db.get_poll_by_id(&vote.poll_id).await.context("get poll")?;
        let status = self.db.get_status_by_id(&poll.status_id).await.context("get poll status")?;
        self.invalidate_status_from_timelines(&status.id);
        if !status.local {
            return Ok(());
        }

        // Tallies of local polls are ours to keep.
        poll.increment_votes(&vote.choices);
        self.db.update_poll(&poll).await.context("update poll")?;
        if let Err(e) = self
            .outbox
            .send(cancel, Outbound::UpdateStatus(Box::new(status)))
            .await
        {
            warn!(%msg, "federate poll update: {e:#}");
        }
        Ok(())
    }

    pub(super) async fn fedi_create_follow_req(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let req: &FollowRequest = model!(msg, FollowRequest);
        match self.db.put_follow_request(req).await {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => {
                debug!(%msg, "follow request already stored");
                return Ok(());
            }
            Err(e) => return Err(e.context("put follow request")),
        }
        let target = self
            .db
            .get_account_by_id(&req.target_account_id)
            .await
            .context("get follow target")?;
        self.handle_follow_request(cancel, req, &target).await
    }

    /// Either queues a request for a locked account or accepts it on the
    /// spot.
    pub(crate) async fn handle_follow_request(
        &self,
        cancel: &CancellationToken,
        req: &FollowRequest,
        target: &Account,
    ) -> Result<()> {
        if target.locked {
            self.follow_requests_stats(&target.id, 1).await;
            self.log_notify(
                "follow request",
                self.notify_follow_request(target, &req.account_id).await,
            );
            return Ok(());
        }

        let follow = self
            .db
            .accept_follow_request(&req.account_id, &req.target_account_id)
            .await
            .context("accept follow request")?;
        self.follow_added_stats(&follow).await;
        if let Err(e) = self
            .outbox
            .send(cancel, Outbound::AcceptFollow(follow.clone()))
            .await
        {
            warn!(follow = %follow.uri, "federate accept follow: {e:#}");
        }
        self.log_notify("follow", self.notify_follow(&follow).await);
        Ok(())
    }

    pub(super) async fn fedi_create_like(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let mut fave: StatusFave = model!(msg, Fave).clone();
        match self.db.put_status_fave(&fave).await {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => {
                debug!(%msg, "fave already stored");
                return Ok(());
            }
            Err(e) => return Err(e.context("put status fave")),
        }

        match ApprovalState::of_fave(&fave) {
            ApprovalState::PendingApproval => {
                self.log_notify("pending fave", self.notify_pending_fave(&fave).await);
                return Ok(());
            }
            ApprovalState::PreApproved => {
                self.approve_fave(cancel, &mut fave).await.context("approve fave")?;
            }
            ApprovalState::Open => {}
        }

        self.log_notify("fave", self.notify_fave(&fave).await);
        self.invalidate_status_from_timelines(&fave.status_id);
        Ok(())
    }

    pub(super) async fn fedi_create_announce(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        if optional(self.db.get_status_by_uri(&boost.uri).await)?.is_some() {
            debug!(%msg, "boost already stored");
            return Ok(());
        }
        let mut boost = match self
            .federation
            .enrich_announce(cancel, &msg.receiving.username, boost)
            .await
        {
            Ok(b) => b,
            Err(e) if benign(&e) || is_already_exists(&e) => {
                debug!(%msg, "skipping announce: {e:#}");
                return Ok(());
            }
            Err(e) => return Err(e.context("enrich announce")),
        };

        match ApprovalState::of_status(&boost) {
            ApprovalState::PendingApproval => {
                self.log_notify("pending announce", self.notify_pending_announce(&boost).await);
                return Ok(());
            }
            ApprovalState::PreApproved => {
                self.approve_announce(cancel, &mut boost)
                    .await
                    .context("approve announce")?;
            }
            ApprovalState::Open => {}
        }

        self.status_created_stats(&boost).await;
        if let Err(e) = self.timeline_and_notify_status(&boost).await {
            error!(%msg, "timeline and notify boost: {e:#}");
        }
        self.log_notify("announce", self.notify_announce(&boost).await);
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        Ok(())
    }

    pub(super) async fn fedi_create_block(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let block: &Block = model!(msg, Block);
        match self.db.put_block(block).await {
            Ok(()) => {}
            // The cleanup below is safe to repeat.
            Err(e) if is_already_exists(&e) => debug!(%msg, "block already stored"),
            Err(e) => return Err(e.context("put block")),
        }
        let failed = self.block_cleanup(block).await;
        if failed > 0 {
            warn!(%msg, failed, "block cleanup incomplete");
        }
        Ok(())
    }

    pub(super) async fn fedi_create_flag(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let report: &Report = model!(msg, Report);
        match self.db.put_report(report).await {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => return Ok(()),
            Err(e) => return Err(e.context("put report")),
        }
        self.log_notify("report", self.notify_report(report).await);
        Ok(())
    }

    pub(super) async fn fedi_update_account(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        match self
            .federation
            .refresh_account(
                cancel,
                &msg.receiving.username,
                &msg.requesting,
                msg.ap_object.as_ref(),
                Duration::ZERO,
            )
            .await
        {
            Ok(a) => {
                debug!(account = %a.uri, "account refreshed");
                Ok(())
            }
            Err(e) if benign(&e) => {
                debug!(%msg, "skipping account update: {e:#}");
                Ok(())
            }
            Err(e) => Err(e.context("refresh account")),
        }
    }

    pub(super) async fn fedi_update_status(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let existing: &Status = model!(msg, Status);
        let status = match self
            .federation
            .refresh_status(
                cancel,
                &msg.receiving.username,
                existing,
                msg.ap_object.as_ref(),
                Duration::ZERO,
            )
            .await
        {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(()),
            Err(e) if benign(&e) => {
                debug!(%msg, "skipping status update: {e:#}");
                return Ok(());
            }
            Err(e) => return Err(e.context("refresh status")),
        };

        if let Some(poll) = status.poll.as_deref().filter(|p| p.closing) {
            self.log_notify("poll closed", self.notify_poll_closed(&status, poll).await);
        }
        self.stream_status_edit(&status);
        self.log_notify("status edit", self.notify_status_edit(&status).await);
        Ok(())
    }

    pub(super) async fn fedi_accept_follow(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        // Our account followed theirs; they said yes.
        let (follower, target) = (&msg.receiving.id, &msg.requesting.id);
        let follow = match self.db.accept_follow_request(follower, target).await {
            Ok(f) => f,
            Err(e) if is_not_found(&e) => {
                debug!(%msg, "no follow request to accept");
                return Ok(());
            }
            Err(e) => return Err(e.context("accept follow request")),
        };
        self.follow_requests_stats(target, -1).await;
        self.follow_added_stats(&follow).await;
        info!(follow = %follow.uri, "follow accepted");
        Ok(())
    }

    pub(super) async fn fedi_accept_like(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        // Local faves are stored as approved already.
        debug!(%msg, "like accepted");
        Ok(())
    }

    pub(super) async fn fedi_accept_reply(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let reply: &Status = model!(msg, Status);
        let mut status = self.db.get_status_by_id(&reply.id).await.context("get reply")?;
        if !status.pending_approval {
            debug!(%msg, "reply already approved");
            return Ok(());
        }
        status.pending_approval = false;
        status.approved_by_uri = msg.ap_iri.clone().or_else(|| reply.approved_by_uri.clone());
        self.db.update_status(&status).await.context("update reply")?;

        // Approval is stored from here on; nothing below may bail out.
        self.status_created_stats(&status).await;
        if let Err(e) = self.timeline_and_notify_status(&status).await {
            error!(%msg, "timeline and notify reply: {e:#}");
        }
        if let Some(parent) = &status.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        // The first send went out while still pending.
        if let Err(e) = self
            .outbox
            .send(cancel, Outbound::CreateStatus(Box::new(status)))
            .await
        {
            warn!(%msg, "federate approved reply: {e:#}");
        }
        Ok(())
    }

    pub(super) async fn fedi_accept_announce(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        let mut boost = self.db.get_status_by_id(&boost.id).await.context("get boost")?;
        if !boost.pending_approval {
            debug!(%msg, "boost already approved");
            return Ok(());
        }
        boost.pending_approval = false;
        boost.approved_by_uri = msg.ap_iri.clone();
        self.db.update_status(&boost).await.context("update boost")?;

        self.status_created_stats(&boost).await;
        if let Err(e) = self.timeline_and_notify_status(&boost).await {
            error!(%msg, "timeline and notify boost: {e:#}");
        }
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        if let Err(e) = self
            .outbox
            .send(cancel, Outbound::Announce(Box::new(boost)))
            .await
        {
            warn!(%msg, "federate approved boost: {e:#}");
        }
        Ok(())
    }

    pub(super) async fn fedi_reject_follow(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let (follower, target) = (&msg.receiving.id, &msg.requesting.id);
        let had_request = self.remove_follow_request(follower, target).await?;
        let had_follow = self.remove_follow(follower, target).await?.is_some();
        debug!(%msg, had_request, had_follow, "follow rejected");
        Ok(())
    }

    pub(super) async fn fedi_reject_like(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        if let Some(stored) = optional(self.db.get_status_fave(&fave.account_id, &fave.status_id).await)? {
            self.db.delete_status_fave(&stored).await.context("delete fave")?;
            self.invalidate_status_from_timelines(&stored.status_id);
        }
        Ok(())
    }

    pub(super) async fn fedi_reject_reply(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let reply: &Status = model!(msg, Status);
        let Some(status) = optional(self.db.get_status_by_id(&reply.id).await)? else {
            return Ok(());
        };
        self.workers.purge(&[status.id.as_str(), status.uri.as_str()]);
        self.wipe_status(&status).await.context("wipe rejected reply")?;
        if !status.pending_approval {
            self.status_removed_stats(&status).await;
        }
        if let Some(parent) = &status.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        Ok(())
    }

    pub(super) async fn fedi_reject_announce(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        let Some(boost) = optional(self.db.get_status_by_id(&boost.id).await)? else {
            return Ok(());
        };
        self.workers.purge(&[boost.id.as_str(), boost.uri.as_str()]);
        self.wipe_status(&boost).await.context("wipe rejected boost")?;
        if !boost.pending_approval {
            self.status_removed_stats(&boost).await;
        }
        Ok(())
    }

    pub(super) async fn fedi_undo_follow(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let follow: &Follow = model!(msg, Follow);
        if msg.requesting.id != follow.account_id {
            return Err(Error::NotPermitted(format!("{msg}: not the follower")).into());
        }
        self.remove_follow_request(&follow.account_id, &follow.target_account_id)
            .await?;
        self.remove_follow(&follow.account_id, &follow.target_account_id)
            .await?;
        Ok(())
    }

    pub(super) async fn fedi_undo_block(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let block: &Block = model!(msg, Block);
        if let Some(stored) = optional(self.db.get_block(&block.account_id, &block.target_account_id).await)? {
            self.db.delete_block(&stored).await.context("delete block")?;
        }
        Ok(())
    }

    pub(super) async fn fedi_undo_like(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let fave: &StatusFave = model!(msg, Fave);
        if let Some(stored) = optional(self.db.get_status_fave(&fave.account_id, &fave.status_id).await)? {
            self.db.delete_status_fave(&stored).await.context("delete fave")?;
            self.invalidate_status_from_timelines(&stored.status_id);
        }
        Ok(())
    }

    pub(super) async fn fedi_undo_announce(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let boost: &Status = model!(msg, Status);
        let Some(boost) = optional(self.db.get_status_by_uri(&boost.uri).await)? else {
            return Ok(());
        };
        if boost.account_id != msg.requesting.id {
            return Err(Error::NotPermitted(format!("{msg}: not the booster")).into());
        }
        self.workers.purge(&[boost.id.as_str(), boost.uri.as_str()]);
        self.wipe_status(&boost).await.context("wipe boost")?;
        self.status_removed_stats(&boost).await;
        if let Some(original) = &boost.boost_of_id {
            self.invalidate_status_from_timelines(original);
        }
        Ok(())
    }

    pub(super) async fn fedi_delete_status(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let status: &Status = model!(msg, Status);
        if status.account_id != msg.requesting.id {
            return Err(Error::NotPermitted(format!("{msg}: not the author")).into());
        }
        let purged = self.workers.purge(&[status.id.as_str(), status.uri.as_str()]);
        debug!(%msg, purged, "purged queued work");

        let Some(stored) = optional(self.db.get_status_by_id(&status.id).await)? else {
            return Ok(());
        };
        self.wipe_status(&stored).await.context("wipe status")?;
        if !stored.pending_approval {
            self.status_removed_stats(&stored).await;
        }
        if let Some(parent) = &stored.in_reply_to_id {
            self.invalidate_status_from_timelines(parent);
        }
        Ok(())
    }

    pub(super) async fn fedi_delete_account(&self, _cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let account = &msg.requesting;
        let purged = self.workers.purge(&[account.id.as_str(), account.uri.as_str()]);
        debug!(%msg, purged, "purged queued work");
        self.delete_account_content(&account.id).await
    }

    pub(super) async fn fedi_move_account(&self, cancel: &CancellationToken, msg: FromFediApi) -> Result<()> {
        let target_uri = msg
            .target_uri
            .clone()
            .ok_or_else(|| Error::InvalidMessage(format!("{msg}: move without target")))?;
        self.move_account(cancel, &msg.receiving.username, &msg.requesting, &target_uri)
            .await
    }
}
