/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Index names used by callers to address cached values. Key parts are
//! given in the order the name lists them.

pub const ID: &str = "ID";
pub const URI: &str = "URI";
pub const URL: &str = "URL";
pub const ACCOUNT_ID: &str = "AccountID";
pub const TARGET_ACCOUNT_ID: &str = "TargetAccountID";
pub const STATUS_ID: &str = "StatusID";
pub const POLL_ID: &str = "PollID";
pub const REQUESTER_ID: &str = "RequesterID";
pub const ITEM_ID: &str = "ItemID";
pub const ACCOUNT_ID_TARGET_ACCOUNT_ID: &str = "AccountID.TargetAccountID";
pub const ACCOUNT_ID_STATUS_ID: &str = "AccountID.StatusID";
pub const BOOST_OF_ID_ACCOUNT_ID: &str = "BoostOfID.AccountID";
pub const NOTIFICATION_TYPE_TARGET_ORIGIN_STATUS: &str =
    "NotificationType.TargetAccountID.OriginAccountID.StatusID";
pub const THREAD_ID_ACCOUNT_ID: &str = "ThreadID.AccountID";
pub const POLL_ID_ACCOUNT_ID: &str = "PollID.AccountID";
pub const TYPE_REQUESTER_ITEM: &str = "Type.RequesterID.ItemID";
pub const ITEM_TYPE_REQUESTER_ITEM: &str = "ItemType.RequesterID.ItemID";
