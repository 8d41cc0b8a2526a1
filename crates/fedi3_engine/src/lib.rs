/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Asynchronous activity processing for a federated social server.
//!
//! [`runtime::Engine`] is the entry point. Client actions and verified
//! inbox activities are queued onto bounded worker pools, routed on their
//! (verb, object type) pair and applied against storage, timelines and
//! notifications. Outbound activities are rendered and delivered through a
//! third pool.

pub mod cache;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod federation;
pub mod filter;
pub mod http_retry;
pub mod model;
pub mod outbox;
pub mod paging;
pub mod processing;
pub mod runtime;
pub mod social_db;
pub mod storage;
pub mod stream;
pub mod timeline;
pub mod util;
pub mod workers;

#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use error::Error;
pub use runtime::Engine;
