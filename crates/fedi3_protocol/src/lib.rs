/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const AS_PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// Verb of an activity, as named by ActivityStreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActivityType {
    Create,
    Update,
    Accept,
    Reject,
    Delete,
    Move,
    Undo,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Delete => "Delete",
            Self::Move => "Move",
            Self::Undo => "Undo",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Accept" => Ok(Self::Accept),
            "Reject" => Ok(Self::Reject),
            "Delete" => Ok(Self::Delete),
            "Move" => Ok(Self::Move),
            "Undo" => Ok(Self::Undo),
            other => Err(UnknownType(other.to_string())),
        }
    }
}

/// Type of the object an activity acts upon. Activities that are
/// themselves objects (Follow, Like, ...) appear here too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Note,
    Question,
    Person,
    Follow,
    Like,
    Announce,
    Block,
    Flag,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Question => "Question",
            Self::Person => "Person",
            Self::Follow => "Follow",
            Self::Like => "Like",
            Self::Announce => "Announce",
            Self::Block => "Block",
            Self::Flag => "Flag",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Note" | "Article" | "Page" => Ok(Self::Note),
            "Question" => Ok(Self::Question),
            "Person" | "Service" | "Application" | "Group" => Ok(Self::Person),
            "Follow" => Ok(Self::Follow),
            "Like" | "EmojiReact" => Ok(Self::Like),
            "Announce" => Ok(Self::Announce),
            "Block" => Ok(Self::Block),
            "Flag" => Ok(Self::Flag),
            other => Err(UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownType(pub String);

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown activity vocabulary type: {}", self.0)
    }
}

impl std::error::Error for UnknownType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_subtypes_map_to_person() {
        assert_eq!("Service".parse::<ObjectType>(), Ok(ObjectType::Person));
        assert_eq!("Article".parse::<ObjectType>(), Ok(ObjectType::Note));
        assert!("Tombstone".parse::<ObjectType>().is_err());
    }

    #[test]
    fn display_matches_vocabulary() {
        assert_eq!(ActivityType::Undo.to_string(), "Undo");
        assert_eq!(ObjectType::Announce.to_string(), "Announce");
        assert_eq!("Move".parse::<ActivityType>(), Ok(ActivityType::Move));
    }
}
