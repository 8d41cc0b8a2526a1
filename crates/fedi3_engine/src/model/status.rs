/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Account;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    FollowersOnly,
    Direct,
}

/// Who may interact with a status without asking first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    #[default]
    Anyone,
    Followers,
    Following,
    Mentioned,
    Nobody,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionPolicy {
    #[serde(default)]
    pub can_reply: PolicyRule,
    #[serde(default)]
    pub can_like: PolicyRule,
    #[serde(default)]
    pub can_announce: PolicyRule,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_warning: String,
    #[serde(default)]
    pub local: bool,
    pub account_id: String,
    #[serde(default)]
    pub account_uri: String,
    #[serde(skip)]
    pub account: Option<Arc<Account>>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_uri: Option<String>,
    #[serde(default)]
    pub in_reply_to_account_id: Option<String>,
    #[serde(skip)]
    pub in_reply_to: Option<Arc<Status>>,
    #[serde(default)]
    pub boost_of_id: Option<String>,
    #[serde(default)]
    pub boost_of_uri: Option<String>,
    #[serde(default)]
    pub boost_of_account_id: Option<String>,
    #[serde(skip)]
    pub boost_of: Option<Arc<Status>>,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub mention_account_ids: Vec<String>,
    #[serde(default)]
    pub poll_id: Option<String>,
    #[serde(skip)]
    pub poll: Option<Arc<Poll>>,
    #[serde(default)]
    pub interaction_policy: InteractionPolicy,
    #[serde(default)]
    pub pending_approval: bool,
    /// Set by the dereferencer when the remote request already satisfied
    /// a grant in the target's interaction policy. Never persisted.
    #[serde(skip)]
    pub pre_approved: bool,
    #[serde(default)]
    pub approved_by_uri: Option<String>,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    #[serde(default)]
    pub edited_at_ms: Option<i64>,
    #[serde(default)]
    pub fetched_at_ms: i64,
}

impl Status {
    pub fn is_boost(&self) -> bool {
        self.boost_of_id.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    pub fn mentions(&self, account_id: &str) -> bool {
        self.mention_account_ids.iter().any(|id| id == account_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub status_id: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub votes: Vec<i64>,
    #[serde(default)]
    pub voters: i64,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
    #[serde(default)]
    pub closed_at_ms: Option<i64>,
    /// Transient: the incoming update just closed this poll.
    #[serde(skip)]
    pub closing: bool,
}

impl Poll {
    pub fn increment_votes(&mut self, choices: &[usize]) {
        if self.votes.len() < self.options.len() {
            self.votes.resize(self.options.len(), 0);
        }
        for &c in choices {
            if let Some(v) = self.votes.get_mut(c) {
                *v += 1;
            }
        }
        self.voters += 1;
    }

    pub fn decrement_votes(&mut self, choices: &[usize]) {
        for &c in choices {
            if let Some(v) = self.votes.get_mut(c) {
                *v = (*v - 1).max(0);
            }
        }
        self.voters = (self.voters - 1).max(0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollVote {
    pub id: String,
    pub poll_id: String,
    pub account_id: String,
    pub choices: Vec<usize>,
    #[serde(default)]
    pub created_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn votes_grow_to_option_count() {
        let mut poll = Poll {
            options: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        };
        poll.increment_votes(&[0, 2, 7]);
        assert_eq!(poll.votes, vec![1, 0, 1]);
        assert_eq!(poll.voters, 1);
        poll.decrement_votes(&[0]);
        poll.decrement_votes(&[0]);
        assert_eq!(poll.votes, vec![0, 0, 1]);
        assert_eq!(poll.voters, 0);
    }
}
