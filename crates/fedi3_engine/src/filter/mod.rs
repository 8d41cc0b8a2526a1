/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Per-requester decisions over statuses and accounts, cached in the
//! mutes and visibility decision caches.

mod mutes;
mod visibility;

pub use mutes::MuteFilter;
pub use visibility::VisibilityFilter;
