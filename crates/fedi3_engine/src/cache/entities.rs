/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::index::*;
use super::{key, key_of, Cacheable};
use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, Notification, PollVote, Status,
    StatusFave, ThreadMute, UserMute,
};

impl Cacheable for Account {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            URL => key_of(&[&self.url]),
            _ => None,
        }
    }

    fn detach(&self) -> Self {
        let mut a = self.clone();
        a.avatar = None;
        a.header = None;
        a
    }
}

impl Cacheable for Status {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            URL => key_of(&[&self.url]),
            BOOST_OF_ID_ACCOUNT_ID => {
                key_of(&[self.boost_of_id.as_deref()?, &self.account_id])
            }
            _ => None,
        }
    }

    fn detach(&self) -> Self {
        let mut s = self.clone();
        s.account = None;
        s.in_reply_to = None;
        s.boost_of = None;
        s.poll = None;
        s
    }
}

impl Cacheable for Follow {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            ACCOUNT_ID_TARGET_ACCOUNT_ID => key_of(&[&self.account_id, &self.target_account_id]),
            ACCOUNT_ID => key_of(&[&self.account_id]),
            TARGET_ACCOUNT_ID => key_of(&[&self.target_account_id]),
            _ => None,
        }
    }
}

impl Cacheable for FollowRequest {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            ACCOUNT_ID_TARGET_ACCOUNT_ID => key_of(&[&self.account_id, &self.target_account_id]),
            ACCOUNT_ID => key_of(&[&self.account_id]),
            TARGET_ACCOUNT_ID => key_of(&[&self.target_account_id]),
            _ => None,
        }
    }
}

impl Cacheable for Block {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            ACCOUNT_ID_TARGET_ACCOUNT_ID => key_of(&[&self.account_id, &self.target_account_id]),
            ACCOUNT_ID => key_of(&[&self.account_id]),
            TARGET_ACCOUNT_ID => key_of(&[&self.target_account_id]),
            _ => None,
        }
    }
}

impl Cacheable for StatusFave {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            ACCOUNT_ID_STATUS_ID => key_of(&[&self.account_id, &self.status_id]),
            STATUS_ID => key_of(&[&self.status_id]),
            _ => None,
        }
    }
}

impl Cacheable for Notification {
    fn index_key(&self, index: &str) -> Option<String> {
        let status_id = self.status_id.as_deref().unwrap_or_default();
        match index {
            ID => key_of(&[&self.id]),
            // Follow notifications have no status; the empty part is kept.
            NOTIFICATION_TYPE_TARGET_ORIGIN_STATUS => Some(key(&[
                self.notification_type.as_str(),
                &self.target_account_id,
                &self.origin_account_id,
                status_id,
            ])),
            STATUS_ID => key_of(&[status_id]),
            _ => None,
        }
    }
}

impl Cacheable for UserMute {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            ACCOUNT_ID_TARGET_ACCOUNT_ID => key_of(&[&self.account_id, &self.target_account_id]),
            ACCOUNT_ID => key_of(&[&self.account_id]),
            _ => None,
        }
    }

    fn expires_at_ms(&self) -> Option<i64> {
        self.expires_at_ms
    }
}

impl Cacheable for ThreadMute {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            THREAD_ID_ACCOUNT_ID => key_of(&[&self.thread_id, &self.account_id]),
            ACCOUNT_ID => key_of(&[&self.account_id]),
            _ => None,
        }
    }
}

impl Cacheable for InteractionApproval {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            URI => key_of(&[&self.uri]),
            _ => None,
        }
    }
}

impl Cacheable for PollVote {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            ID => key_of(&[&self.id]),
            POLL_ID_ACCOUNT_ID => key_of(&[&self.poll_id, &self.account_id]),
            POLL_ID => key_of(&[&self.poll_id]),
            _ => None,
        }
    }
}
