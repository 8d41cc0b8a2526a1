/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! What local accounts get to see of processed activities: timeline
//! entries, notifications and stream events.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::Processor;
use crate::error::{is_already_exists, optional};
use crate::model::{
    Account, Follow, Notification, NotificationType, Poll, Report, Status, StatusFave,
};
use crate::stream::{StreamEvent, StreamKind};
use crate::util::{new_id, now_ms};

impl Processor {
    /// Stores one notification unless `target` is remote, is the origin,
    /// has muted notifications from the origin, or already has it.
    pub(crate) async fn notify(
        &self,
        kind: NotificationType,
        target: &Account,
        origin_account_id: &str,
        status_id: Option<&str>,
        report_id: Option<&str>,
    ) -> Result<()> {
        if !target.is_local() || target.id == origin_account_id {
            return Ok(());
        }
        if let Some(origin) = optional(self.db.get_account_by_id(origin_account_id).await)? {
            if self
                .mutes
                .account_notifications_muted(Some(target), &origin)
                .await?
            {
                debug!(%kind, target = %target.username, origin = %origin.uri, "notification muted");
                return Ok(());
            }
        }

        let existing = self
            .db
            .get_notification(kind, &target.id, origin_account_id, status_id.unwrap_or(""))
            .await;
        if optional(existing)?.is_some() {
            return Ok(());
        }

        let n = Notification {
            id: new_id(),
            notification_type: kind,
            target_account_id: target.id.clone(),
            origin_account_id: origin_account_id.to_string(),
            status_id: status_id.map(str::to_string),
            report_id: report_id.map(str::to_string),
            read: false,
            created_at_ms: now_ms(),
        };
        match self.db.put_notification(&n).await {
            Ok(()) => {}
            Err(e) if is_already_exists(&e) => return Ok(()),
            Err(e) => return Err(e.context("put notification")),
        }
        self.streams
            .send(StreamEvent::new(StreamKind::Notification, &target.id, "user", &n.id));
        Ok(())
    }

    async fn notify_account_id(
        &self,
        kind: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: Option<&str>,
    ) -> Result<()> {
        let Some(target) = optional(self.db.get_account_by_id(target_account_id).await)? else {
            return Ok(());
        };
        self.notify(kind, &target, origin_account_id, status_id, None).await
    }

    /// Notification failures never abort a handler.
    pub(crate) fn log_notify(&self, what: &str, res: Result<()>) {
        if let Err(e) = res {
            warn!(what, "notify: {e:#}");
        }
    }

    pub(crate) async fn notify_pending_reply(&self, reply: &Status) -> Result<()> {
        let Some(owner) = reply.in_reply_to_account_id.as_deref() else {
            return Ok(());
        };
        self.notify_account_id(NotificationType::PendingReply, owner, &reply.account_id, Some(&reply.id))
            .await
    }

    pub(crate) async fn notify_pending_fave(&self, fave: &StatusFave) -> Result<()> {
        self.notify_account_id(
            NotificationType::PendingFave,
            &fave.target_account_id,
            &fave.account_id,
            Some(&fave.status_id),
        )
        .await
    }

    pub(crate) async fn notify_pending_announce(&self, boost: &Status) -> Result<()> {
        let Some(owner) = boost.boost_of_account_id.as_deref() else {
            return Ok(());
        };
        self.notify_account_id(NotificationType::PendingReblog, owner, &boost.account_id, Some(&boost.id))
            .await
    }

    pub(crate) async fn notify_fave(&self, fave: &StatusFave) -> Result<()> {
        self.notify_account_id(
            NotificationType::Favourite,
            &fave.target_account_id,
            &fave.account_id,
            Some(&fave.status_id),
        )
        .await
    }

    pub(crate) async fn notify_announce(&self, boost: &Status) -> Result<()> {
        let (Some(owner), Some(original)) = (&boost.boost_of_account_id, &boost.boost_of_id) else {
            return Ok(());
        };
        self.notify_account_id(NotificationType::Reblog, owner, &boost.account_id, Some(original))
            .await
    }

    pub(crate) async fn notify_follow_request(&self, target: &Account, requester_id: &str) -> Result<()> {
        self.notify(NotificationType::FollowRequest, target, requester_id, None, None)
            .await
    }

    pub(crate) async fn notify_follow(&self, follow: &Follow) -> Result<()> {
        self.notify_account_id(NotificationType::Follow, &follow.target_account_id, &follow.account_id, None)
            .await
    }

    /// Tells every moderator about a new report.
    pub(crate) async fn notify_report(&self, report: &Report) -> Result<()> {
        for m in self.db.get_instance_moderators().await? {
            if let Err(e) = self
                .notify(NotificationType::AdminReport, &m, &report.account_id, None, Some(&report.id))
                .await
            {
                warn!(moderator = %m.username, report = %report.id, "notify report: {e:#}");
            }
        }
        Ok(())
    }

    /// Tells local voters and the local author that a poll closed.
    pub(crate) async fn notify_poll_closed(&self, status: &Status, poll: &Poll) -> Result<()> {
        let mut targets: Vec<String> = self
            .db
            .get_poll_votes(&poll.id)
            .await?
            .into_iter()
            .map(|v| v.account_id)
            .collect();
        targets.push(status.account_id.clone());
        targets.sort();
        targets.dedup();
        for id in targets {
            let Some(target) = optional(self.db.get_account_by_id(&id).await)? else {
                continue;
            };
            if !target.is_local() {
                continue;
            }
            let n = Notification {
                id: new_id(),
                notification_type: NotificationType::Poll,
                target_account_id: target.id.clone(),
                origin_account_id: status.account_id.clone(),
                status_id: Some(status.id.clone()),
                report_id: None,
                read: false,
                created_at_ms: now_ms(),
            };
            match self.db.put_notification(&n).await {
                Ok(()) => self.streams.send(StreamEvent::new(
                    StreamKind::Notification,
                    &target.id,
                    "user",
                    &n.id,
                )),
                Err(e) if is_already_exists(&e) => {}
                Err(e) => warn!(status = %status.uri, "notify poll closed: {e:#}"),
            }
        }
        Ok(())
    }

    /// Tells local accounts that faved or boosted `status` that it was
    /// edited.
    pub(crate) async fn notify_status_edit(&self, status: &Status) -> Result<()> {
        let mut targets: Vec<String> = self
            .db
            .get_status_faves(&status.id)
            .await?
            .into_iter()
            .map(|f| f.account_id)
            .collect();
        targets.extend(
            self.db
                .get_status_boosts(&status.id)
                .await?
                .into_iter()
                .map(|b| b.account_id),
        );
        targets.sort();
        targets.dedup();
        for id in targets {
            self.log_notify(
                "status edit",
                self.notify_account_id(NotificationType::Update, &id, &status.account_id, Some(&status.id))
                    .await,
            );
        }
        Ok(())
    }

    /// Puts a new status on the timelines of the author and its local
    /// followers, and notifies mentioned accounts and subscribers.
    pub(crate) async fn timeline_and_notify_status(&self, status: &Status) -> Result<()> {
        let author = self
            .db
            .get_account_by_id(&status.account_id)
            .await
            .context("get status author")?;

        let mut follows = self.db.get_account_local_followers(&author.id).await?;
        if author.is_local() {
            // Authors see their own posts; no list entries hang off this.
            follows.push(Follow {
                account_id: author.id.clone(),
                target_account_id: author.id.clone(),
                show_reblogs: true,
                ..Default::default()
            });
        }

        for follow in &follows {
            if let Err(e) = self.timeline_status_for(follow, status).await {
                warn!(owner = %follow.account_id, status = %status.uri, "timeline status: {e:#}");
            }
        }

        self.notify_mentions(status).await;

        if !status.is_reply() && !status.is_boost() {
            for follow in follows.iter().filter(|f| f.notify && f.account_id != author.id) {
                self.log_notify(
                    "status subscription",
                    self.notify_account_id(NotificationType::Status, &follow.account_id, &author.id, Some(&status.id))
                        .await,
                );
            }
        }
        Ok(())
    }

    async fn timeline_status_for(&self, follow: &Follow, status: &Status) -> Result<()> {
        let owner = self.db.get_account_by_id(&follow.account_id).await?;
        if status.is_boost() && !follow.show_reblogs && owner.id != status.account_id {
            return Ok(());
        }
        if !self.visibility.status_home_timelineable(&owner, status).await? {
            return Ok(());
        }
        if self.mutes.status_muted(Some(&owner), status).await? {
            return Ok(());
        }

        if self.home.ingest(&owner.id, status) {
            self.streams
                .send(StreamEvent::new(StreamKind::Update, &owner.id, "home", &status.id));
        }
        if follow.id.is_empty() {
            return Ok(());
        }
        for entry in self.db.get_list_entries_for_follow(&follow.id).await? {
            if self.lists.ingest(&entry.list_id, status) {
                self.streams.send(StreamEvent::new(
                    StreamKind::Update,
                    &owner.id,
                    &format!("list:{}", entry.list_id),
                    &status.id,
                ));
            }
        }
        Ok(())
    }

    async fn notify_mentions(&self, status: &Status) {
        for id in &status.mention_account_ids {
            self.log_notify("mention", self.notify_mention(id, status).await);
        }
    }

    async fn notify_mention(&self, account_id: &str, status: &Status) -> Result<()> {
        let Some(target) = optional(self.db.get_account_by_id(account_id).await)? else {
            return Ok(());
        };
        if !target.is_local() || target.id == status.account_id {
            return Ok(());
        }
        if !self.visibility.status_visible(Some(&target), status).await? {
            return Ok(());
        }
        if self
            .mutes
            .status_notifications_muted(Some(&target), status)
            .await?
        {
            return Ok(());
        }
        self.notify(NotificationType::Mention, &target, &status.account_id, Some(&status.id), None)
            .await
    }

    /// Drops prepared copies of a status so the next read sees new counts.
    pub(crate) fn invalidate_status_from_timelines(&self, status_id: &str) {
        self.home.unprepare_item_from_all(status_id);
        self.lists.unprepare_item_from_all(status_id);
    }

    /// Invalidates an edited status and tells the owners of timelines that
    /// show it.
    pub(crate) fn stream_status_edit(&self, status: &Status) {
        self.invalidate_status_from_timelines(&status.id);
        for owner in self.home.owners_of(&status.id) {
            self.streams
                .send(StreamEvent::new(StreamKind::StatusUpdate, &owner, "home", &status.id));
        }
    }
}
