/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Applies the side effects of activities.
//!
//! Messages from the client API and from federation are routed on their
//! (verb, object type) pair through two fixed tables built once in
//! [`Processor::new`]. A pair with no entry is refused with
//! [`Error::Unhandled`].

mod approval;
mod fromclientapi;
mod fromfediapi;
mod move_account;
mod query;
mod surface;
mod util;

use anyhow::Result;
use fedi3_protocol::{ActivityType, ObjectType};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::db::Db;
use crate::error::{is_not_permitted, is_unretrievable, Error};
use crate::federation::{Dereferencer, Outbox};
use crate::filter::{MuteFilter, VisibilityFilter};
use crate::stream::Streams;
use crate::timeline::Timelines;
use crate::workers::{FromClientApi, FromFediApi, Workers};

type Route = (ActivityType, ObjectType);
type Handler<M> = fn(Arc<Processor>, CancellationToken, M) -> BoxFuture<'static, Result<()>>;

macro_rules! routes {
    ($msg:ty; $($activity:ident $object:ident => $method:ident),* $(,)?) => {
        HashMap::from([$(
            (
                (ActivityType::$activity, ObjectType::$object),
                (|p: Arc<Processor>, cancel: CancellationToken, msg: $msg| -> BoxFuture<'static, Result<()>> {
                    async move { p.$method(&cancel, msg).await }.boxed()
                }) as Handler<$msg>,
            ),
        )*])
    };
}

/// Pulls the expected model variant out of a message, refusing the message
/// when it carries something else.
macro_rules! model {
    ($msg:expr, $variant:ident) => {
        match &$msg.model {
            Some(crate::workers::Model::$variant(m)) => m,
            _ => {
                return Err(crate::error::Error::InvalidMessage(format!(
                    "{}: expected {} model",
                    $msg,
                    stringify!($variant)
                ))
                .into())
            }
        }
    };
}
pub(crate) use model;

/// Everything the processor needs from the rest of the engine.
pub struct ProcessorParts {
    pub db: Db,
    pub workers: Arc<Workers>,
    pub dereferencer: Arc<dyn Dereferencer>,
    pub outbox: Arc<dyn Outbox>,
    pub streams: Streams,
}

pub struct Processor {
    db: Db,
    workers: Arc<Workers>,
    federation: Arc<dyn Dereferencer>,
    outbox: Arc<dyn Outbox>,
    streams: Streams,
    home: Timelines,
    lists: Timelines,
    visibility: VisibilityFilter,
    mutes: MuteFilter,
    protocol: String,
    host: String,
    fresh: Duration,
    fedi_routes: HashMap<Route, Handler<FromFediApi>>,
    client_routes: HashMap<Route, Handler<FromClientApi>>,
}

impl Processor {
    pub fn new(cfg: &EngineConfig, parts: ProcessorParts) -> Self {
        let fedi_routes = routes! { FromFediApi;
            Create Note => fedi_create_status,
            Create Question => fedi_create_poll_vote,
            Create Follow => fedi_create_follow_req,
            Create Like => fedi_create_like,
            Create Announce => fedi_create_announce,
            Create Block => fedi_create_block,
            Create Flag => fedi_create_flag,
            Update Note => fedi_update_status,
            Update Person => fedi_update_account,
            Accept Follow => fedi_accept_follow,
            Accept Like => fedi_accept_like,
            Accept Note => fedi_accept_reply,
            Accept Announce => fedi_accept_announce,
            Reject Follow => fedi_reject_follow,
            Reject Like => fedi_reject_like,
            Reject Note => fedi_reject_reply,
            Reject Announce => fedi_reject_announce,
            Undo Follow => fedi_undo_follow,
            Undo Block => fedi_undo_block,
            Undo Like => fedi_undo_like,
            Undo Announce => fedi_undo_announce,
            Delete Note => fedi_delete_status,
            Delete Person => fedi_delete_account,
            Move Person => fedi_move_account,
        };
        let client_routes = routes! { FromClientApi;
            Create Note => client_create_status,
            Create Question => client_create_poll_vote,
            Create Follow => client_create_follow_req,
            Create Like => client_create_like,
            Create Announce => client_create_announce,
            Create Block => client_create_block,
            Create Flag => client_create_flag,
            Update Note => client_update_status,
            Update Person => client_update_account,
            Accept Follow => client_accept_follow,
            Accept Like => client_accept_like,
            Accept Note => client_accept_reply,
            Accept Announce => client_accept_announce,
            Reject Follow => client_reject_follow,
            Reject Like => client_reject_like,
            Reject Note => client_reject_reply,
            Reject Announce => client_reject_announce,
            Undo Follow => client_undo_follow,
            Undo Block => client_undo_block,
            Undo Like => client_undo_like,
            Undo Announce => client_undo_announce,
            Delete Note => client_delete_status,
            Delete Person => client_delete_account,
            Move Person => client_move_account,
        };

        Self {
            visibility: VisibilityFilter::new(parts.db.clone()),
            mutes: MuteFilter::new(parts.db.clone()),
            db: parts.db,
            workers: parts.workers,
            federation: parts.dereferencer,
            outbox: parts.outbox,
            streams: parts.streams,
            home: Timelines::new("home", cfg.timeline_max_items(), cfg.timeline_prune_to()),
            lists: Timelines::new("list", cfg.timeline_max_items(), cfg.timeline_prune_to()),
            protocol: cfg.protocol().to_string(),
            host: cfg.host().to_string(),
            fresh: cfg.fresh_window(),
            fedi_routes,
            client_routes,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    pub fn home_timelines(&self) -> &Timelines {
        &self.home
    }

    pub fn list_timelines(&self) -> &Timelines {
        &self.lists
    }

    /// Trims both timeline sets.
    pub fn prune_timelines(&self) -> usize {
        self.home.prune() + self.lists.prune()
    }

    pub async fn process_from_fedi_api(
        self: Arc<Self>,
        cancel: CancellationToken,
        msg: FromFediApi,
    ) -> Result<()> {
        info!(
            activity = %msg.activity,
            object = %msg.object,
            requesting = %msg.requesting.uri,
            receiving = %msg.receiving.username,
            iri = msg.ap_iri.as_deref().unwrap_or(""),
            "processing from fedi api"
        );
        let handler = *self
            .fedi_routes
            .get(&(msg.activity, msg.object))
            .ok_or(Error::Unhandled {
                activity: msg.activity,
                object: msg.object,
            })?;
        handler(self, cancel, msg).await
    }

    pub async fn process_from_client_api(
        self: Arc<Self>,
        cancel: CancellationToken,
        msg: FromClientApi,
    ) -> Result<()> {
        info!(
            activity = %msg.activity,
            object = %msg.object,
            origin = %msg.origin.username,
            target = msg.target.as_ref().map_or("", |t| t.uri.as_str()),
            "processing from client api"
        );
        let handler = *self
            .client_routes
            .get(&(msg.activity, msg.object))
            .ok_or(Error::Unhandled {
                activity: msg.activity,
                object: msg.object,
            })?;
        handler(self, cancel, msg).await
    }
}

/// Federation refusals the dispatcher skips instead of failing on.
fn benign(err: &anyhow::Error) -> bool {
    is_unretrievable(err) || is_not_permitted(err)
}
