/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedi3_protocol::{ActivityType, ObjectType};

/// Typed error kinds that callers branch on. Everything else travels as a
/// plain `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no entries")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("unretrievable: {0}")]
    Unretrievable(String),
    #[error("not permitted: {0}")]
    NotPermitted(String),
    #[error("unhandled: {activity} {object}")]
    Unhandled {
        activity: ActivityType,
        object: ObjectType,
    },
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("queue closed")]
    QueueClosed,
    #[error("cancelled")]
    Cancelled,
}

fn find(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|e| e.downcast_ref::<Error>())
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(find(err), Some(Error::NotFound))
}

pub fn is_already_exists(err: &anyhow::Error) -> bool {
    matches!(find(err), Some(Error::AlreadyExists))
}

pub fn is_unretrievable(err: &anyhow::Error) -> bool {
    matches!(find(err), Some(Error::Unretrievable(_)))
}

pub fn is_not_permitted(err: &anyhow::Error) -> bool {
    matches!(find(err), Some(Error::NotPermitted(_)))
}

/// Converts a not-found result into `None`, passing other errors through.
pub fn optional<T>(res: anyhow::Result<T>) -> anyhow::Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_survives_context_wrapping() {
        let res: anyhow::Result<()> = Err(Error::NotFound.into());
        let err = res.context("get account").context("create follow").unwrap_err();
        assert!(is_not_found(&err));
        assert!(!is_unretrievable(&err));
    }

    #[test]
    fn optional_only_swallows_not_found() {
        assert!(matches!(optional::<u8>(Err(Error::NotFound.into())), Ok(None)));
        assert!(optional::<u8>(Err(Error::AlreadyExists.into())).is_err());
        assert!(matches!(optional(Ok(3u8)), Ok(Some(3))));
    }
}
