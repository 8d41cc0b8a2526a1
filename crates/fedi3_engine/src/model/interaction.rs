/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusFave {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub status_id: String,
    #[serde(default)]
    pub pending_approval: bool,
    #[serde(skip)]
    pub pre_approved: bool,
    #[serde(default)]
    pub approved_by_uri: Option<String>,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    #[default]
    Like,
    Reply,
    Announce,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Like => "like",
            InteractionType::Reply => "reply",
            InteractionType::Announce => "announce",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local account's recorded consent to one remote interaction. Written
/// once and never updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionApproval {
    pub id: String,
    pub uri: String,
    /// Local account that owns the interacted-with status.
    pub account_id: String,
    pub interacting_account_id: String,
    /// URI of the reply, like or boost that was approved.
    pub interaction_uri: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub created_at_ms: i64,
}
