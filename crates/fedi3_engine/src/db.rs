/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Storage behind the caches.
//!
//! Reads go through the entity caches, writes persist first and then
//! either cache the new value or invalidate the old one. Relationship
//! writes also drop the visibility and mute decisions of both accounts,
//! since a decision may have been computed from the absence of the row.

use anyhow::Result;
use std::sync::Arc;

use crate::cache::index::*;
use crate::cache::Caches;
use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, List, ListEntry, Notification,
    NotificationType, Poll, PollVote, RelationFilter, Report, StatsDelta, Status, StatusFave,
    ThreadMute, UserMute,
};
use crate::paging::Page;
use crate::storage::Storage;

#[derive(Clone)]
pub struct Db {
    store: Arc<dyn Storage>,
    caches: Arc<Caches>,
}

impl Db {
    pub fn new(store: Arc<dyn Storage>, caches: Arc<Caches>) -> Self {
        Self { store, caches }
    }

    pub fn caches(&self) -> &Arc<Caches> {
        &self.caches
    }

    pub async fn get_account_by_id(&self, id: &str) -> Result<Account> {
        self.caches
            .account
            .load(ID, &[id], || self.store.get_account_by_id(id))
            .await
    }

    pub async fn get_account_by_uri(&self, uri: &str) -> Result<Account> {
        self.caches
            .account
            .load(URI, &[uri], || self.store.get_account_by_uri(uri))
            .await
    }

    pub async fn get_account_by_url(&self, url: &str) -> Result<Account> {
        self.caches
            .account
            .load(URL, &[url], || self.store.get_account_by_url(url))
            .await
    }

    pub async fn put_account(&self, account: &Account) -> Result<()> {
        self.caches
            .account
            .store(account, || self.store.put_account(account))
            .await
    }

    pub async fn update_account(&self, account: &Account) -> Result<()> {
        self.store.update_account(account).await?;
        self.caches.account.invalidate(ID, &[&account.id]);
        Ok(())
    }

    pub async fn adjust_account_stats(&self, account_id: &str, delta: StatsDelta) -> Result<()> {
        self.store.adjust_account_stats(account_id, delta).await?;
        self.caches.account.invalidate(ID, &[account_id]);
        Ok(())
    }

    pub async fn delete_account(&self, id: &str) -> Result<()> {
        self.store.delete_account(id).await?;
        self.caches.account.invalidate(ID, &[id]);
        self.caches.invalidate_visibility_for(&[id]);
        self.caches.invalidate_mutes_for(&[id]);
        Ok(())
    }

    pub async fn get_instance_moderators(&self) -> Result<Vec<Account>> {
        self.store.get_instance_moderators().await
    }

    pub async fn get_status_by_id(&self, id: &str) -> Result<Status> {
        self.caches
            .status
            .load(ID, &[id], || self.store.get_status_by_id(id))
            .await
    }

    pub async fn get_status_by_uri(&self, uri: &str) -> Result<Status> {
        self.caches
            .status
            .load(URI, &[uri], || self.store.get_status_by_uri(uri))
            .await
    }

    pub async fn get_status_boost(&self, boost_of_id: &str, account_id: &str) -> Result<Status> {
        self.caches
            .status
            .load(BOOST_OF_ID_ACCOUNT_ID, &[boost_of_id, account_id], || {
                self.store.get_status_boost(boost_of_id, account_id)
            })
            .await
    }

    pub async fn get_status_boosts(&self, boost_of_id: &str) -> Result<Vec<Status>> {
        self.store.get_status_boosts(boost_of_id).await
    }

    pub async fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.store.get_account_status_ids(account_id).await
    }

    pub async fn put_status(&self, status: &Status) -> Result<()> {
        self.caches
            .status
            .store(status, || self.store.put_status(status))
            .await
    }

    pub async fn update_status(&self, status: &Status) -> Result<()> {
        self.store.update_status(status).await?;
        self.caches.status.invalidate(ID, &[&status.id]);
        Ok(())
    }

    pub async fn delete_status_by_id(&self, id: &str) -> Result<()> {
        self.store.delete_status_by_id(id).await?;
        self.caches.status.invalidate(ID, &[id]);
        Ok(())
    }

    pub async fn get_poll_by_id(&self, id: &str) -> Result<Poll> {
        self.store.get_poll_by_id(id).await
    }

    pub async fn put_poll(&self, poll: &Poll) -> Result<()> {
        self.store.put_poll(poll).await
    }

    pub async fn update_poll(&self, poll: &Poll) -> Result<()> {
        self.store.update_poll(poll).await?;
        // Statuses carry their poll populated.
        self.caches.status.invalidate(ID, &[&poll.status_id]);
        Ok(())
    }

    pub async fn delete_poll_by_id(&self, id: &str) -> Result<()> {
        self.store.delete_poll_by_id(id).await?;
        self.caches.poll_vote.invalidate(POLL_ID, &[id]);
        Ok(())
    }

    pub async fn get_poll_vote(&self, poll_id: &str, account_id: &str) -> Result<PollVote> {
        self.caches
            .poll_vote
            .load(POLL_ID_ACCOUNT_ID, &[poll_id, account_id], || {
                self.store.get_poll_vote(poll_id, account_id)
            })
            .await
    }

    pub async fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>> {
        self.store.get_poll_votes(poll_id).await
    }

    pub async fn put_poll_vote(&self, vote: &PollVote) -> Result<()> {
        self.caches
            .poll_vote
            .store(vote, || self.store.put_poll_vote(vote))
            .await
    }

    pub async fn get_follow(&self, account_id: &str, target_account_id: &str) -> Result<Follow> {
        self.caches
            .follow
            .load(
                ACCOUNT_ID_TARGET_ACCOUNT_ID,
                &[account_id, target_account_id],
                || self.store.get_follow(account_id, target_account_id),
            )
            .await
    }

    pub async fn is_following(&self, account_id: &str, target_account_id: &str) -> Result<bool> {
        Ok(crate::error::optional(self.get_follow(account_id, target_account_id).await)?.is_some())
    }

    pub async fn put_follow(&self, follow: &Follow) -> Result<()> {
        self.caches
            .follow
            .store(follow, || self.store.put_follow(follow))
            .await?;
        self.caches
            .invalidate_visibility_for(&[&follow.account_id, &follow.target_account_id]);
        Ok(())
    }

    pub async fn delete_follow(&self, account_id: &str, target_account_id: &str) -> Result<()> {
        self.store.delete_follow(account_id, target_account_id).await?;
        self.caches
            .follow
            .invalidate(ACCOUNT_ID_TARGET_ACCOUNT_ID, &[account_id, target_account_id]);
        self.caches
            .invalidate_visibility_for(&[account_id, target_account_id]);
        Ok(())
    }

    pub async fn get_account_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
        self.store.get_account_followers(account_id).await
    }

    pub async fn get_account_local_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
        self.store.get_account_local_followers(account_id).await
    }

    pub async fn delete_follows_where(&self, filter: &RelationFilter) -> Result<Vec<Follow>> {
        let gone = self.store.delete_follows_where(filter).await?;
        for f in &gone {
            self.caches.follow.invalidate(ID, &[&f.id]);
            self.caches
                .invalidate_visibility_for(&[&f.account_id, &f.target_account_id]);
        }
        Ok(gone)
    }

    pub async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<FollowRequest> {
        self.caches
            .follow_request
            .load(
                ACCOUNT_ID_TARGET_ACCOUNT_ID,
                &[account_id, target_account_id],
                || self.store.get_follow_request(account_id, target_account_id),
            )
            .await
    }

    pub async fn put_follow_request(&self, request: &FollowRequest) -> Result<()> {
        self.caches
            .follow_request
            .store(request, || self.store.put_follow_request(request))
            .await?;
        self.caches
            .invalidate_visibility_for(&[&request.account_id, &request.target_account_id]);
        Ok(())
    }

    pub async fn accept_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Follow> {
        let follow = self
            .store
            .accept_follow_request(account_id, target_account_id)
            .await?;
        self.caches
            .follow_request
            .invalidate(ACCOUNT_ID_TARGET_ACCOUNT_ID, &[account_id, target_account_id]);
        self.caches
            .follow
            .invalidate(ACCOUNT_ID_TARGET_ACCOUNT_ID, &[account_id, target_account_id]);
        self.caches
            .invalidate_visibility_for(&[account_id, target_account_id]);
        Ok(follow)
    }

    pub async fn delete_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<()> {
        self.store
            .delete_follow_request(account_id, target_account_id)
            .await?;
        self.caches
            .follow_request
            .invalidate(ACCOUNT_ID_TARGET_ACCOUNT_ID, &[account_id, target_account_id]);
        self.caches
            .invalidate_visibility_for(&[account_id, target_account_id]);
        Ok(())
    }

    pub async fn get_account_follow_requests(
        &self,
        target_account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<FollowRequest>> {
        self.store
            .get_account_follow_requests(target_account_id, page)
            .await
    }

    pub async fn delete_follow_requests_where(
        &self,
        filter: &RelationFilter,
    ) -> Result<Vec<FollowRequest>> {
        let gone = self.store.delete_follow_requests_where(filter).await?;
        for f in &gone {
            self.caches.follow_request.invalidate(ID, &[&f.id]);
            self.caches
                .invalidate_visibility_for(&[&f.account_id, &f.target_account_id]);
        }
        Ok(gone)
    }

    pub async fn get_block(&self, account_id: &str, target_account_id: &str) -> Result<Block> {
        self.caches
            .block
            .load(
                ACCOUNT_ID_TARGET_ACCOUNT_ID,
                &[account_id, target_account_id],
                || self.store.get_block(account_id, target_account_id),
            )
            .await
    }

    /// Whether either account blocks the other.
    pub async fn is_either_blocked(&self, a: &str, b: &str) -> Result<bool> {
        if crate::error::optional(self.get_block(a, b).await)?.is_some() {
            return Ok(true);
        }
        Ok(crate::error::optional(self.get_block(b, a).await)?.is_some())
    }

    pub async fn put_block(&self, block: &Block) -> Result<()> {
        self.caches
            .block
            .store(block, || self.store.put_block(block))
            .await?;
        self.caches
            .invalidate_visibility_for(&[&block.account_id, &block.target_account_id]);
        Ok(())
    }

    pub async fn delete_block(&self, block: &Block) -> Result<()> {
        self.store.delete_block_by_id(&block.id).await?;
        self.caches.block.invalidate(ID, &[&block.id]);
        self.caches
            .invalidate_visibility_for(&[&block.account_id, &block.target_account_id]);
        Ok(())
    }

    pub async fn get_account_blocks(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Block>> {
        self.store.get_account_blocks(account_id, page).await
    }

    pub async fn delete_blocks_where(&self, filter: &RelationFilter) -> Result<Vec<Block>> {
        let gone = self.store.delete_blocks_where(filter).await?;
        for b in &gone {
            self.caches.block.invalidate(ID, &[&b.id]);
            self.caches
                .invalidate_visibility_for(&[&b.account_id, &b.target_account_id]);
        }
        Ok(gone)
    }

    pub async fn get_status_fave(&self, account_id: &str, status_id: &str) -> Result<StatusFave> {
        self.caches
            .status_fave
            .load(ACCOUNT_ID_STATUS_ID, &[account_id, status_id], || {
                self.store.get_status_fave(account_id, status_id)
            })
            .await
    }

    pub async fn get_status_faves(&self, status_id: &str) -> Result<Vec<StatusFave>> {
        self.store.get_status_faves(status_id).await
    }

    pub async fn put_status_fave(&self, fave: &StatusFave) -> Result<()> {
        self.caches
            .status_fave
            .store(fave, || self.store.put_status_fave(fave))
            .await
    }

    pub async fn update_status_fave(&self, fave: &StatusFave) -> Result<()> {
        self.store.update_status_fave(fave).await?;
        self.caches.status_fave.invalidate(ID, &[&fave.id]);
        Ok(())
    }

    pub async fn delete_status_fave(&self, fave: &StatusFave) -> Result<()> {
        self.store.delete_status_fave_by_id(&fave.id).await?;
        self.caches.status_fave.invalidate(ID, &[&fave.id]);
        Ok(())
    }

    pub async fn get_notification(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: &str,
    ) -> Result<Notification> {
        self.caches
            .notification
            .load(
                NOTIFICATION_TYPE_TARGET_ORIGIN_STATUS,
                &[
                    notification_type.as_str(),
                    target_account_id,
                    origin_account_id,
                    status_id,
                ],
                || {
                    self.store.get_notification(
                        notification_type,
                        target_account_id,
                        origin_account_id,
                        status_id,
                    )
                },
            )
            .await
    }

    pub async fn put_notification(&self, notification: &Notification) -> Result<()> {
        self.caches
            .notification
            .store(notification, || self.store.put_notification(notification))
            .await
    }

    pub async fn get_account_notifications(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Notification>> {
        self.store.get_account_notifications(account_id, page).await
    }

    pub async fn delete_notifications_for_status(&self, status_id: &str) -> Result<()> {
        self.store.delete_notifications_for_status(status_id).await?;
        self.caches.notification.invalidate(STATUS_ID, &[status_id]);
        Ok(())
    }

    pub async fn delete_notifications_for_account(&self, account_id: &str) -> Result<()> {
        self.store.delete_notifications_for_account(account_id).await?;
        // Not indexed by account; rare enough to drop the lot.
        self.caches.notification.clear();
        Ok(())
    }

    pub async fn get_user_mute(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<UserMute> {
        self.caches
            .user_mute
            .load(
                ACCOUNT_ID_TARGET_ACCOUNT_ID,
                &[account_id, target_account_id],
                || self.store.get_user_mute(account_id, target_account_id),
            )
            .await
    }

    pub async fn put_user_mute(&self, mute: &UserMute) -> Result<()> {
        self.caches
            .user_mute
            .store(mute, || self.store.put_user_mute(mute))
            .await?;
        self.caches.invalidate_mutes_for(&[&mute.account_id]);
        Ok(())
    }

    pub async fn delete_user_mute(&self, mute: &UserMute) -> Result<()> {
        self.store.delete_user_mute_by_id(&mute.id).await?;
        self.caches.user_mute.invalidate(ID, &[&mute.id]);
        self.caches.invalidate_mutes_for(&[&mute.account_id]);
        Ok(())
    }

    pub async fn get_thread_mute(&self, thread_id: &str, account_id: &str) -> Result<ThreadMute> {
        self.caches
            .thread_mute
            .load(THREAD_ID_ACCOUNT_ID, &[thread_id, account_id], || {
                self.store.get_thread_mute(thread_id, account_id)
            })
            .await
    }

    pub async fn put_thread_mute(&self, mute: &ThreadMute) -> Result<()> {
        self.caches
            .thread_mute
            .store(mute, || self.store.put_thread_mute(mute))
            .await?;
        self.caches.invalidate_mutes_for(&[&mute.account_id]);
        Ok(())
    }

    pub async fn get_interaction_approval_by_uri(&self, uri: &str) -> Result<InteractionApproval> {
        self.caches
            .interaction_approval
            .load(URI, &[uri], || self.store.get_interaction_approval_by_uri(uri))
            .await
    }

    pub async fn get_interaction_approval_by_id(&self, id: &str) -> Result<InteractionApproval> {
        self.caches
            .interaction_approval
            .load(ID, &[id], || self.store.get_interaction_approval_by_id(id))
            .await
    }

    pub async fn put_interaction_approval(&self, approval: &InteractionApproval) -> Result<()> {
        self.caches
            .interaction_approval
            .store(approval, || self.store.put_interaction_approval(approval))
            .await
    }

    pub async fn get_report_by_id(&self, id: &str) -> Result<Report> {
        self.store.get_report_by_id(id).await
    }

    pub async fn put_report(&self, report: &Report) -> Result<()> {
        self.store.put_report(report).await
    }

    pub async fn get_list_by_id(&self, id: &str) -> Result<List> {
        self.store.get_list_by_id(id).await
    }

    pub async fn put_list(&self, list: &List) -> Result<()> {
        self.store.put_list(list).await
    }

    pub async fn put_list_entry(&self, entry: &ListEntry) -> Result<()> {
        self.store.put_list_entry(entry).await
    }

    pub async fn get_list_entries_for_follow(&self, follow_id: &str) -> Result<Vec<ListEntry>> {
        self.store.get_list_entries_for_follow(follow_id).await
    }

    pub async fn get_home_timeline(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Status>> {
        self.store.get_home_timeline(account_id, page).await
    }

    pub async fn get_list_timeline(&self, list_id: &str, page: &Page<String>) -> Result<Vec<Status>> {
        self.store.get_list_timeline(list_id, page).await
    }
}
