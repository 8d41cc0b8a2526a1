/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Follow,
    FollowRequest,
    #[default]
    Mention,
    Reblog,
    Favourite,
    Poll,
    Status,
    Update,
    AdminReport,
    PendingFave,
    PendingReply,
    PendingReblog,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "follow",
            NotificationType::FollowRequest => "follow_request",
            NotificationType::Mention => "mention",
            NotificationType::Reblog => "reblog",
            NotificationType::Favourite => "favourite",
            NotificationType::Poll => "poll",
            NotificationType::Status => "status",
            NotificationType::Update => "update",
            NotificationType::AdminReport => "admin.report",
            NotificationType::PendingFave => "pending.favourite",
            NotificationType::PendingReply => "pending.reply",
            NotificationType::PendingReblog => "pending.reblog",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    /// Local account being notified.
    pub target_account_id: String,
    pub origin_account_id: String,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub status_ids: Vec<String>,
    /// Forward a copy to the reported account's instance.
    #[serde(default)]
    pub forwarded: bool,
    #[serde(default)]
    pub created_at_ms: i64,
}
