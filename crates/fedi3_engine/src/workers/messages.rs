/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedi3_protocol::{ActivityType, ObjectType};
use std::fmt;
use std::sync::Arc;

use crate::model::{
    Account, Block, Follow, FollowRequest, InteractionApproval, PollVote, Report, Status,
    StatusFave,
};

/// Anything a [`super::WorkerPool`] can carry.
pub trait WorkerMessage: fmt::Display + Send + 'static {
    /// IDs and URIs of the entities this message is about: its actor, its
    /// explicit target and its own object. Queued messages are purged by
    /// matching against this set when one of those entities is deleted.
    fn subject_ids(&self) -> Vec<&str>;
}

/// Parsed domain object attached to a message.
#[derive(Debug, Clone)]
pub enum Model {
    Status(Box<Status>),
    Account(Box<Account>),
    Follow(Follow),
    FollowRequest(FollowRequest),
    Block(Block),
    Fave(StatusFave),
    Report(Report),
    PollVote(PollVote),
    Approval(InteractionApproval),
}

impl Model {
    pub fn kind(&self) -> &'static str {
        match self {
            Model::Status(_) => "status",
            Model::Account(_) => "account",
            Model::Follow(_) => "follow",
            Model::FollowRequest(_) => "follow_request",
            Model::Block(_) => "block",
            Model::Fave(_) => "fave",
            Model::Report(_) => "report",
            Model::PollVote(_) => "poll_vote",
            Model::Approval(_) => "approval",
        }
    }

    /// The entity itself, plus the status a fave points at. Parents,
    /// boosted originals and participating accounts are left out: deleting
    /// those must not drop work about this one.
    fn subject_ids(&self) -> Vec<&str> {
        match self {
            Model::Status(s) => vec![s.id.as_str(), s.uri.as_str()],
            Model::Account(a) => vec![a.id.as_str(), a.uri.as_str()],
            Model::Follow(f) => vec![f.id.as_str(), f.uri.as_str()],
            Model::FollowRequest(f) => vec![f.id.as_str(), f.uri.as_str()],
            Model::Block(b) => vec![b.id.as_str(), b.uri.as_str()],
            Model::Fave(f) => vec![f.id.as_str(), f.uri.as_str(), f.status_id.as_str()],
            Model::Report(r) => vec![r.id.as_str(), r.uri.as_str()],
            Model::PollVote(v) => vec![v.id.as_str()],
            Model::Approval(a) => vec![a.id.as_str(), a.uri.as_str(), a.interaction_uri.as_str()],
        }
    }
}

/// An activity received from a remote server, already verified by the
/// inbox handler.
#[derive(Debug, Clone)]
pub struct FromFediApi {
    pub activity: ActivityType,
    pub object: ObjectType,
    /// IRI to dereference when no object was delivered inline.
    pub ap_iri: Option<String>,
    /// The ActivityStreams object as delivered.
    pub ap_object: Option<serde_json::Value>,
    pub model: Option<Model>,
    pub target_uri: Option<String>,
    /// Remote account that sent the activity.
    pub requesting: Arc<Account>,
    /// Local account whose inbox received it.
    pub receiving: Arc<Account>,
}

impl FromFediApi {
    pub fn new(
        activity: ActivityType,
        object: ObjectType,
        requesting: Arc<Account>,
        receiving: Arc<Account>,
    ) -> Self {
        Self {
            activity,
            object,
            ap_iri: None,
            ap_object: None,
            model: None,
            target_uri: None,
            requesting,
            receiving,
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_iri(mut self, iri: impl Into<String>) -> Self {
        self.ap_iri = Some(iri.into());
        self
    }

    pub fn with_object(mut self, object: serde_json::Value) -> Self {
        self.ap_object = Some(object);
        self
    }

    pub fn with_target_uri(mut self, uri: impl Into<String>) -> Self {
        self.target_uri = Some(uri.into());
        self
    }
}

impl fmt::Display for FromFediApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} requesting={} receiving={}",
            self.activity, self.object, self.requesting.uri, self.receiving.username
        )?;
        if let Some(iri) = &self.ap_iri {
            write!(f, " iri={iri}")?;
        }
        if let Some(m) = &self.model {
            write!(f, " model={}", m.kind())?;
        }
        Ok(())
    }
}

impl WorkerMessage for FromFediApi {
    fn subject_ids(&self) -> Vec<&str> {
        // Not the receiving account: one inbox carries activities that
        // matter to other local accounts too.
        let mut out = vec![self.requesting.id.as_str(), self.requesting.uri.as_str()];
        out.extend(self.target_uri.as_deref());
        out.extend(self.ap_iri.as_deref());
        if let Some(m) = &self.model {
            out.extend(m.subject_ids());
        }
        out
    }
}

/// An action taken by a local account through the client API.
#[derive(Debug, Clone)]
pub struct FromClientApi {
    pub activity: ActivityType,
    pub object: ObjectType,
    pub model: Option<Model>,
    /// Local account performing the action.
    pub origin: Arc<Account>,
    /// Account on the receiving end, when there is one.
    pub target: Option<Arc<Account>>,
    pub target_uri: Option<String>,
}

impl FromClientApi {
    pub fn new(activity: ActivityType, object: ObjectType, origin: Arc<Account>) -> Self {
        Self {
            activity,
            object,
            model: None,
            origin,
            target: None,
            target_uri: None,
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_target(mut self, target: Arc<Account>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_target_uri(mut self, uri: impl Into<String>) -> Self {
        self.target_uri = Some(uri.into());
        self
    }
}

impl fmt::Display for FromClientApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} origin={}",
            self.activity, self.object, self.origin.username
        )?;
        if let Some(t) = &self.target {
            write!(f, " target={}", t.uri)?;
        }
        if let Some(m) = &self.model {
            write!(f, " model={}", m.kind())?;
        }
        Ok(())
    }
}

impl WorkerMessage for FromClientApi {
    fn subject_ids(&self) -> Vec<&str> {
        let mut out = vec![self.origin.id.as_str(), self.origin.uri.as_str()];
        if let Some(t) = &self.target {
            out.extend([t.id.as_str(), t.uri.as_str()]);
        }
        out.extend(self.target_uri.as_deref());
        if let Some(m) = &self.model {
            out.extend(m.subject_ids());
        }
        out
    }
}

/// One rendered activity on its way to one inbox.
#[derive(Debug, Clone)]
pub struct DeliveryMsg {
    pub id: String,
    /// URI of the sending actor.
    pub actor_id: String,
    /// URI of the activity's object.
    pub object_id: Option<String>,
    /// URI of the account or status the activity targets.
    pub target_id: Option<String>,
    pub inbox: String,
    pub body: Arc<[u8]>,
}

impl fmt::Display for DeliveryMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery {} to {}", self.id, self.inbox)
    }
}

impl WorkerMessage for DeliveryMsg {
    fn subject_ids(&self) -> Vec<&str> {
        let mut out = vec![self.actor_id.as_str()];
        out.extend(self.object_id.as_deref());
        out.extend(self.target_id.as_deref());
        out
    }
}
