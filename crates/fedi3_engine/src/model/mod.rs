/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Domain entities shared by storage, caches and processing. Associations
//! to other entities are stored by ID; the `Arc` fields are optional
//! populated copies and never persisted or cached.

mod account;
mod interaction;
mod notification;
mod relationship;
mod status;

pub use account::{Account, AccountStats, MediaAttachment, StatsDelta};
pub use interaction::{InteractionApproval, InteractionType, StatusFave};
pub use notification::{Notification, NotificationType, Report};
pub use relationship::{
    Block, Follow, FollowRequest, List, ListEntry, RelationFilter, ThreadMute, UserMute,
};
pub use status::{InteractionPolicy, PolicyRule, Poll, PollVote, Status, Visibility};
