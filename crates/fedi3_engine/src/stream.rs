/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::Serialize;
use tokio::sync::broadcast;

use crate::util::now_ms;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Update,
    Notification,
    StatusUpdate,
    Delete,
}

/// Something a connected client of `account_id` should see right away.
#[derive(Clone, Debug, Serialize)]
pub struct StreamEvent {
    pub kind: StreamKind,
    pub account_id: String,
    /// `home`, `list:<id>`, or `user` for notifications and deletes.
    pub timeline: String,
    /// Status or notification ID.
    pub id: String,
    pub ts_ms: i64,
}

impl StreamEvent {
    pub fn new(kind: StreamKind, account_id: &str, timeline: &str, id: &str) -> Self {
        Self {
            kind,
            account_id: account_id.to_string(),
            timeline: timeline.to_string(),
            id: id.to_string(),
            ts_ms: now_ms(),
        }
    }
}

#[derive(Clone)]
pub struct Streams {
    tx: broadcast::Sender<StreamEvent>,
}

impl Streams {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Nobody listening is not an error.
    pub fn send(&self, ev: StreamEvent) {
        let _ = self.tx.send(ev);
    }
}

impl Default for Streams {
    fn default() -> Self {
        Self::new(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_sent_after_subscribing() {
        let s = Streams::default();
        s.send(StreamEvent::new(StreamKind::Update, "a", "home", "1"));
        let mut rx = s.subscribe();
        s.send(StreamEvent::new(StreamKind::Delete, "a", "user", "2"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, StreamKind::Delete);
        assert_eq!(ev.id, "2");
    }
}
