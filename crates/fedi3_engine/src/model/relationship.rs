/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    #[serde(default = "default_true")]
    pub show_reblogs: bool,
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    #[serde(default = "default_true")]
    pub show_reblogs: bool,
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub created_at_ms: i64,
}

impl FollowRequest {
    /// The follow this request turns into once accepted.
    pub fn to_follow(&self) -> Follow {
        Follow {
            id: self.id.clone(),
            uri: self.uri.clone(),
            account_id: self.account_id.clone(),
            target_account_id: self.target_account_id.clone(),
            show_reblogs: self.show_reblogs,
            notify: self.notify,
            created_at_ms: self.created_at_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMute {
    pub id: String,
    pub account_id: String,
    pub target_account_id: String,
    #[serde(default)]
    pub notifications: bool,
    /// `None` mutes forever.
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
    #[serde(default)]
    pub created_at_ms: i64,
}

impl UserMute {
    pub fn expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms, Some(at) if at <= now_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMute {
    pub id: String,
    pub thread_id: String,
    pub account_id: String,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub account_id: String,
    pub title: String,
}

/// Membership of one followed account in a list, keyed by the follow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: String,
    pub list_id: String,
    pub follow_id: String,
}

/// Which relationship rows a bulk delete touches. Unset sides match all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationFilter {
    pub account_id: Option<String>,
    pub target_account_id: Option<String>,
}

impl RelationFilter {
    pub fn from_account(id: &str) -> Self {
        Self {
            account_id: Some(id.to_string()),
            target_account_id: None,
        }
    }

    pub fn targeting(id: &str) -> Self {
        Self {
            account_id: None,
            target_account_id: Some(id.to_string()),
        }
    }

    pub fn matches(&self, account_id: &str, target_account_id: &str) -> bool {
        self.account_id.as_deref().map_or(true, |a| a == account_id)
            && self
                .target_account_id
                .as_deref()
                .map_or(true, |t| t == target_account_id)
    }
}

fn default_true() -> bool {
    true
}
