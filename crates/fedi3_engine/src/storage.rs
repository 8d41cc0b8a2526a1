/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Persistence interface consumed by the engine.
//!
//! Lookups that find nothing fail with [`crate::error::Error::NotFound`];
//! inserts that collide with an existing row fail with
//! [`crate::error::Error::AlreadyExists`]. Deletes are idempotent and
//! succeed when there was nothing to delete. Paged queries return items
//! newest first whatever the page order.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, List, ListEntry, Notification,
    NotificationType, Poll, PollVote, RelationFilter, Report, StatsDelta, Status, StatusFave,
    ThreadMute, UserMute,
};
use crate::paging::Page;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_account_by_id(&self, id: &str) -> Result<Account>;
    async fn get_account_by_uri(&self, uri: &str) -> Result<Account>;
    async fn get_account_by_url(&self, url: &str) -> Result<Account>;
    async fn put_account(&self, account: &Account) -> Result<()>;
    async fn update_account(&self, account: &Account) -> Result<()>;
    /// Applies `delta` atomically; counters never go below zero.
    async fn adjust_account_stats(&self, account_id: &str, delta: StatsDelta) -> Result<()>;
    async fn delete_account(&self, id: &str) -> Result<()>;
    async fn get_instance_moderators(&self) -> Result<Vec<Account>>;

    async fn get_status_by_id(&self, id: &str) -> Result<Status>;
    async fn get_status_by_uri(&self, uri: &str) -> Result<Status>;
    async fn get_status_boost(&self, boost_of_id: &str, account_id: &str) -> Result<Status>;
    async fn get_status_boosts(&self, boost_of_id: &str) -> Result<Vec<Status>>;
    async fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>>;
    async fn put_status(&self, status: &Status) -> Result<()>;
    async fn update_status(&self, status: &Status) -> Result<()>;
    async fn delete_status_by_id(&self, id: &str) -> Result<()>;

    async fn get_poll_by_id(&self, id: &str) -> Result<Poll>;
    async fn put_poll(&self, poll: &Poll) -> Result<()>;
    async fn update_poll(&self, poll: &Poll) -> Result<()>;
    async fn delete_poll_by_id(&self, id: &str) -> Result<()>;
    async fn get_poll_vote(&self, poll_id: &str, account_id: &str) -> Result<PollVote>;
    async fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>>;
    async fn put_poll_vote(&self, vote: &PollVote) -> Result<()>;

    async fn get_follow(&self, account_id: &str, target_account_id: &str) -> Result<Follow>;
    async fn put_follow(&self, follow: &Follow) -> Result<()>;
    async fn delete_follow(&self, account_id: &str, target_account_id: &str) -> Result<()>;
    async fn get_account_followers(&self, account_id: &str) -> Result<Vec<Follow>>;
    /// Followers of `account_id` that live on this instance.
    async fn get_account_local_followers(&self, account_id: &str) -> Result<Vec<Follow>>;
    /// Bulk delete; returns the deleted rows.
    async fn delete_follows_where(&self, filter: &RelationFilter) -> Result<Vec<Follow>>;

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<FollowRequest>;
    async fn put_follow_request(&self, request: &FollowRequest) -> Result<()>;
    /// Turns the request into a follow in one transaction.
    async fn accept_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Follow>;
    async fn delete_follow_request(&self, account_id: &str, target_account_id: &str)
        -> Result<()>;
    async fn get_account_follow_requests(
        &self,
        target_account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<FollowRequest>>;
    async fn delete_follow_requests_where(
        &self,
        filter: &RelationFilter,
    ) -> Result<Vec<FollowRequest>>;

    async fn get_block(&self, account_id: &str, target_account_id: &str) -> Result<Block>;
    async fn put_block(&self, block: &Block) -> Result<()>;
    async fn delete_block_by_id(&self, id: &str) -> Result<()>;
    async fn get_account_blocks(&self, account_id: &str, page: &Page<String>)
        -> Result<Vec<Block>>;
    async fn delete_blocks_where(&self, filter: &RelationFilter) -> Result<Vec<Block>>;

    async fn get_status_fave(&self, account_id: &str, status_id: &str) -> Result<StatusFave>;
    async fn get_status_faves(&self, status_id: &str) -> Result<Vec<StatusFave>>;
    async fn put_status_fave(&self, fave: &StatusFave) -> Result<()>;
    async fn update_status_fave(&self, fave: &StatusFave) -> Result<()>;
    async fn delete_status_fave_by_id(&self, id: &str) -> Result<()>;

    async fn get_notification(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: &str,
    ) -> Result<Notification>;
    async fn put_notification(&self, notification: &Notification) -> Result<()>;
    async fn get_account_notifications(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Notification>>;
    async fn delete_notifications_for_status(&self, status_id: &str) -> Result<()>;
    /// Notifications the account received or caused.
    async fn delete_notifications_for_account(&self, account_id: &str) -> Result<()>;

    async fn get_user_mute(&self, account_id: &str, target_account_id: &str) -> Result<UserMute>;
    async fn put_user_mute(&self, mute: &UserMute) -> Result<()>;
    async fn delete_user_mute_by_id(&self, id: &str) -> Result<()>;
    async fn get_thread_mute(&self, thread_id: &str, account_id: &str) -> Result<ThreadMute>;
    async fn put_thread_mute(&self, mute: &ThreadMute) -> Result<()>;

    async fn get_interaction_approval_by_id(&self, id: &str) -> Result<InteractionApproval>;
    async fn get_interaction_approval_by_uri(&self, uri: &str) -> Result<InteractionApproval>;
    async fn put_interaction_approval(&self, approval: &InteractionApproval) -> Result<()>;

    async fn get_report_by_id(&self, id: &str) -> Result<Report>;
    async fn put_report(&self, report: &Report) -> Result<()>;

    async fn get_list_by_id(&self, id: &str) -> Result<List>;
    async fn put_list(&self, list: &List) -> Result<()>;
    async fn put_list_entry(&self, entry: &ListEntry) -> Result<()>;
    async fn get_list_entries_for_follow(&self, follow_id: &str) -> Result<Vec<ListEntry>>;

    /// Statuses by `account_id` and everyone it follows.
    async fn get_home_timeline(&self, account_id: &str, page: &Page<String>)
        -> Result<Vec<Status>>;
    /// Statuses by the followed accounts entered in the list.
    async fn get_list_timeline(&self, list_id: &str, page: &Page<String>) -> Result<Vec<Status>>;
}
