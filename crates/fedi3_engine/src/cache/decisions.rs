/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::index::*;
use super::{key_of, Cacheable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionItem {
    Status,
    Account,
    /// A status considered for a home timeline rather than plain viewing.
    HomeStatus,
}

impl DecisionItem {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionItem::Status => "status",
            DecisionItem::Account => "account",
            DecisionItem::HomeStatus => "home_status",
        }
    }
}

/// Whether `item_id` is muted for `requester_id`.
///
/// The expiries are facts about the mutes themselves: a cached entry can
/// outlive them, so readers check [`CachedMute::mute_expired`] and
/// [`CachedMute::notification_expired`] on every hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMute {
    pub item_type: DecisionItem,
    pub requester_id: String,
    pub item_id: String,
    pub mute: bool,
    pub mute_expiry: Option<i64>,
    pub notifications: bool,
    pub notification_expiry: Option<i64>,
}

impl CachedMute {
    pub fn unmuted(item_type: DecisionItem, requester_id: &str, item_id: &str) -> Self {
        Self {
            item_type,
            requester_id: requester_id.to_string(),
            item_id: item_id.to_string(),
            mute: false,
            mute_expiry: None,
            notifications: false,
            notification_expiry: None,
        }
    }

    pub fn mute_expired(&self, now_ms: i64) -> bool {
        matches!(self.mute_expiry, Some(at) if at <= now_ms)
    }

    pub fn notification_expired(&self, now_ms: i64) -> bool {
        matches!(self.notification_expiry, Some(at) if at <= now_ms)
    }

    pub fn muted_at(&self, now_ms: i64) -> bool {
        self.mute && !self.mute_expired(now_ms)
    }

    pub fn notifications_muted_at(&self, now_ms: i64) -> bool {
        self.notifications && !self.notification_expired(now_ms)
    }
}

impl Cacheable for CachedMute {
    fn index_key(&self, index: &str) -> Option<String> {
        match index {
            TYPE_REQUESTER_ITEM => {
                key_of(&[self.item_type.as_str(), &self.requester_id, &self.item_id])
            }
            REQUESTER_ID => key_of(&[&self.requester_id]),
            ITEM_ID => key_of(&[&self.item_id]),
            _ => None,
        }
    }

    fn expires_at_ms(&self) -> Option<i64> {
        match (self.mute_expiry, self.notification_expiry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Whether `item_id` is visible to `requester_id`. An empty requester
/// stands for an unauthenticated viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVisibility {
    pub item_type: DecisionItem,
    pub requester_id: String,
    pub item_id: String,
    pub value: bool,
}

pub const ANONYMOUS: &str = "-";

impl Cacheable for CachedVisibility {
    fn index_key(&self, index: &str) -> Option<String> {
        let requester: &str = if self.requester_id.is_empty() {
            ANONYMOUS
        } else {
            &self.requester_id
        };
        match index {
            ITEM_TYPE_REQUESTER_ITEM => {
                key_of(&[self.item_type.as_str(), requester, &self.item_id])
            }
            REQUESTER_ID => key_of(&[requester]),
            ITEM_ID => key_of(&[&self.item_id]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_checked_against_now() {
        let mut m = CachedMute::unmuted(DecisionItem::Status, "r", "s");
        m.mute = true;
        m.mute_expiry = Some(1_000);
        m.notifications = true;
        assert!(m.muted_at(999));
        assert!(!m.muted_at(1_000));
        assert!(m.notifications_muted_at(i64::MAX));
        assert_eq!(m.expires_at_ms(), Some(1_000));
    }
}
