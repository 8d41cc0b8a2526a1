/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Interaction approval: replies, likes and boosts of local content that
//! had to ask first.
//!
//! An interaction arrives either pending, in which case the owner is
//! notified and nothing else happens until an Accept, or pre-approved by a
//! grant in the owner's interaction policy. A pre-approved interaction is
//! approved on the spot: the approval record is written and the Accept is
//! sent before the caller goes on to counters and fan-out.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Processor;
use crate::error::Error;
use crate::federation::Outbound;
use crate::model::{InteractionApproval, InteractionType, Status, StatusFave};
use crate::util::{new_id, now_ms};

/// Where an interaction stands on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    /// Needs nothing from the owner.
    Open,
    PendingApproval,
    PreApproved,
}

impl ApprovalState {
    pub fn of(pending_approval: bool, pre_approved: bool) -> Self {
        match (pending_approval, pre_approved) {
            (false, _) => ApprovalState::Open,
            (true, false) => ApprovalState::PendingApproval,
            (true, true) => ApprovalState::PreApproved,
        }
    }

    pub fn of_status(s: &Status) -> Self {
        Self::of(s.pending_approval, s.pre_approved)
    }

    pub fn of_fave(f: &StatusFave) -> Self {
        Self::of(f.pending_approval, f.pre_approved)
    }
}

impl Processor {
    pub(crate) fn authorization_uri(&self, username: &str, id: &str) -> String {
        format!(
            "{}://{}/users/{}/authorizations/{}",
            self.protocol, self.host, username, id
        )
    }

    /// Records `owner_id`'s consent to one interaction and sends the
    /// Accept. Both are required; an error here aborts the caller.
    async fn approve_interaction(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
        interacting_account_id: &str,
        interaction_uri: &str,
        interaction_type: InteractionType,
    ) -> Result<InteractionApproval> {
        let owner = self
            .db
            .get_account_by_id(owner_id)
            .await
            .context("get interaction owner")?;
        if !owner.is_local() {
            return Err(Error::InvalidMessage(format!(
                "cannot approve {interaction_type} {interaction_uri} for remote owner {}",
                owner.uri
            ))
            .into());
        }

        let id = new_id();
        let approval = InteractionApproval {
            uri: self.authorization_uri(&owner.username, &id),
            id,
            account_id: owner.id.clone(),
            interacting_account_id: interacting_account_id.to_string(),
            interaction_uri: interaction_uri.to_string(),
            interaction_type,
            created_at_ms: now_ms(),
        };
        self.db
            .put_interaction_approval(&approval)
            .await
            .context("put interaction approval")?;
        self.outbox
            .send(cancel, Outbound::AcceptInteraction(approval.clone()))
            .await
            .context("send accept")?;
        debug!(kind = %interaction_type, uri = interaction_uri, approval = %approval.uri, "interaction approved");
        Ok(approval)
    }

    /// Approves a reply and stores it as no longer pending.
    pub(crate) async fn approve_reply(&self, cancel: &CancellationToken, status: &mut Status) -> Result<()> {
        let owner = status
            .in_reply_to_account_id
            .clone()
            .ok_or_else(|| Error::InvalidMessage(format!("{} is not a reply", status.uri)))?;
        let approval = self
            .approve_interaction(cancel, &owner, &status.account_id, &status.uri, InteractionType::Reply)
            .await?;
        status.pending_approval = false;
        status.pre_approved = false;
        status.approved_by_uri = Some(approval.uri);
        self.db.update_status(status).await.context("update approved reply")
    }

    pub(crate) async fn approve_announce(&self, cancel: &CancellationToken, boost: &mut Status) -> Result<()> {
        let owner = boost
            .boost_of_account_id
            .clone()
            .ok_or_else(|| Error::InvalidMessage(format!("{} is not a boost", boost.uri)))?;
        let approval = self
            .approve_interaction(cancel, &owner, &boost.account_id, &boost.uri, InteractionType::Announce)
            .await?;
        boost.pending_approval = false;
        boost.pre_approved = false;
        boost.approved_by_uri = Some(approval.uri);
        self.db.update_status(boost).await.context("update approved boost")
    }

    pub(crate) async fn approve_fave(&self, cancel: &CancellationToken, fave: &mut StatusFave) -> Result<()> {
        let approval = self
            .approve_interaction(
                cancel,
                &fave.target_account_id,
                &fave.account_id,
                &fave.uri,
                InteractionType::Like,
            )
            .await?;
        fave.pending_approval = false;
        fave.pre_approved = false;
        fave.approved_by_uri = Some(approval.uri);
        self.db.update_status_fave(fave).await.context("update approved fave")
    }

    /// A refusal to send back for an interaction the owner turned down.
    /// Not stored.
    pub(crate) fn rejection(
        &self,
        owner_username: &str,
        owner_id: &str,
        interacting_account_id: &str,
        interaction_uri: &str,
        interaction_type: InteractionType,
    ) -> InteractionApproval {
        let id = new_id();
        InteractionApproval {
            uri: format!(
                "{}://{}/users/{}/rejections/{}",
                self.protocol, self.host, owner_username, id
            ),
            id,
            account_id: owner_id.to_string(),
            interacting_account_id: interacting_account_id.to_string(),
            interaction_uri: interaction_uri.to_string(),
            interaction_type,
            created_at_ms: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_from_flags() {
        assert_eq!(ApprovalState::of(false, true), ApprovalState::Open);
        assert_eq!(ApprovalState::of(true, false), ApprovalState::PendingApproval);
        assert_eq!(ApprovalState::of(true, true), ApprovalState::PreApproved);
    }
}
