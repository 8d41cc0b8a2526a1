/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Collaborators on the federation side of the engine: fetching remote
//! objects, and sending activities out.
//!
//! Implementations report policy refusals as
//! [`crate::error::Error::Unretrievable`] or
//! [`crate::error::Error::NotPermitted`]; processing treats both as a
//! reason to skip, not as a failure.

use anyhow::Result;
use async_trait::async_trait;
use fedi3_protocol::ActivityType;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, PollVote, Report, Status,
    StatusFave,
};

#[async_trait]
pub trait Dereferencer: Send + Sync {
    /// Brings `existing` up to date from `ap_object`, or by fetching it when
    /// no object is given and the stored copy is older than `fresh`, and
    /// stores the result. `Ok(None)` means the status was already stored by
    /// an earlier or concurrent delivery that will handle it.
    async fn refresh_status(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        existing: &Status,
        ap_object: Option<&serde_json::Value>,
        fresh: Duration,
    ) -> Result<Option<Status>>;

    /// Fetches and stores the status at `uri`. `Ok(None)` as above.
    async fn get_status_by_uri(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        uri: &str,
    ) -> Result<Option<Status>>;

    async fn refresh_account(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        existing: &Account,
        ap_object: Option<&serde_json::Value>,
        fresh: Duration,
    ) -> Result<Account>;

    async fn get_account_by_uri(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        uri: &str,
        force: bool,
    ) -> Result<Account>;

    /// Resolves the boosted status of `boost` and stores the boost.
    async fn enrich_announce(
        &self,
        cancel: &CancellationToken,
        requesting_username: &str,
        boost: &Status,
    ) -> Result<Status>;
}

/// An activity to send out on behalf of a local account.
#[derive(Debug, Clone)]
pub enum Outbound {
    CreateStatus(Box<Status>),
    UpdateStatus(Box<Status>),
    DeleteStatus(Box<Status>),
    Announce(Box<Status>),
    UndoAnnounce(Box<Status>),
    Like(StatusFave),
    UndoLike(StatusFave),
    Follow(FollowRequest),
    UndoFollow(Follow),
    AcceptFollow(Follow),
    RejectFollow(FollowRequest),
    Block(Block),
    UndoBlock(Block),
    AcceptInteraction(InteractionApproval),
    RejectInteraction(InteractionApproval),
    Flag(Report),
    PollVote(PollVote),
    UpdateAccount(Box<Account>),
    DeleteAccount(Box<Account>),
    MoveAccount(Box<Account>),
}

impl Outbound {
    pub fn name(&self) -> &'static str {
        match self {
            Outbound::CreateStatus(_) => "create_status",
            Outbound::UpdateStatus(_) => "update_status",
            Outbound::DeleteStatus(_) => "delete_status",
            Outbound::Announce(_) => "announce",
            Outbound::UndoAnnounce(_) => "undo_announce",
            Outbound::Like(_) => "like",
            Outbound::UndoLike(_) => "undo_like",
            Outbound::Follow(_) => "follow",
            Outbound::UndoFollow(_) => "undo_follow",
            Outbound::AcceptFollow(_) => "accept_follow",
            Outbound::RejectFollow(_) => "reject_follow",
            Outbound::Block(_) => "block",
            Outbound::UndoBlock(_) => "undo_block",
            Outbound::AcceptInteraction(_) => "accept_interaction",
            Outbound::RejectInteraction(_) => "reject_interaction",
            Outbound::Flag(_) => "flag",
            Outbound::PollVote(_) => "poll_vote",
            Outbound::UpdateAccount(_) => "update_account",
            Outbound::DeleteAccount(_) => "delete_account",
            Outbound::MoveAccount(_) => "move_account",
        }
    }

    /// Verb of the rendered activity.
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Outbound::CreateStatus(_)
            | Outbound::Announce(_)
            | Outbound::Like(_)
            | Outbound::Follow(_)
            | Outbound::Block(_)
            | Outbound::Flag(_)
            | Outbound::PollVote(_) => ActivityType::Create,
            Outbound::UpdateStatus(_) | Outbound::UpdateAccount(_) => ActivityType::Update,
            Outbound::DeleteStatus(_) | Outbound::DeleteAccount(_) => ActivityType::Delete,
            Outbound::UndoAnnounce(_)
            | Outbound::UndoLike(_)
            | Outbound::UndoFollow(_)
            | Outbound::UndoBlock(_) => ActivityType::Undo,
            Outbound::AcceptFollow(_) | Outbound::AcceptInteraction(_) => ActivityType::Accept,
            Outbound::RejectFollow(_) | Outbound::RejectInteraction(_) => ActivityType::Reject,
            Outbound::MoveAccount(_) => ActivityType::Move,
        }
    }
}

#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(&self, cancel: &CancellationToken, activity: Outbound) -> Result<()>;
}
