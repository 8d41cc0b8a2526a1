/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: String,
    pub account_id: String,
    pub url: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub statuses_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub follow_requests_count: i64,
    #[serde(default)]
    pub last_status_at_ms: Option<i64>,
}

/// Relative change applied to an account's stats in one storage write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub statuses: i64,
    pub followers: i64,
    pub following: i64,
    pub follow_requests: i64,
    /// Bump `last_status_at_ms` to this value.
    pub last_status_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub url: String,
    pub username: String,
    /// `None` for accounts on this instance.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub inbox_uri: String,
    #[serde(default)]
    pub shared_inbox_uri: Option<String>,
    #[serde(default)]
    pub followers_uri: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub moderator: bool,
    #[serde(default)]
    pub avatar_media_id: Option<String>,
    #[serde(skip)]
    pub avatar: Option<Arc<MediaAttachment>>,
    #[serde(default)]
    pub header_media_id: Option<String>,
    #[serde(skip)]
    pub header: Option<Arc<MediaAttachment>>,
    #[serde(default)]
    pub moved_to_uri: Option<String>,
    #[serde(default)]
    pub also_known_as: Vec<String>,
    #[serde(default)]
    pub stats: AccountStats,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    #[serde(default)]
    pub fetched_at_ms: i64,
    #[serde(default)]
    pub suspended_at_ms: Option<i64>,
}

impl Account {
    pub fn is_local(&self) -> bool {
        self.domain.is_none()
    }

    pub fn is_remote(&self) -> bool {
        self.domain.is_some()
    }

    /// Inbox deliveries should go to: the shared inbox if the remote
    /// advertises one.
    pub fn delivery_inbox(&self) -> &str {
        self.shared_inbox_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.inbox_uri)
    }

    pub fn acct(&self) -> String {
        match &self.domain {
            Some(d) => format!("{}@{}", self.username, d),
            None => self.username.clone(),
        }
    }
}
