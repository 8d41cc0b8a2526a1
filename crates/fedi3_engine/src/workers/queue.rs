/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// A message waiting in a queue together with the token its producer can
/// cancel.
pub struct Queued<M> {
    pub cancel: CancellationToken,
    pub msg: M,
}

/// Bounded FIFO shared by any number of producers and consumers.
///
/// `push` waits while the queue is full; `pop` waits while it is empty.
pub struct MessageQueue<M> {
    capacity: usize,
    items: Mutex<VecDeque<Queued<M>>>,
    not_empty: Notify,
    not_full: Notify,
}

impl<M> MessageQueue<M> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Queued<M>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends `msg`, waiting for room when full. Fails with
    /// [`Error::Cancelled`] if `cancel` fires first.
    pub async fn push(&self, cancel: CancellationToken, msg: M) -> anyhow::Result<()> {
        let mut msg = Some(msg);
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled.into());
            }
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut items = self.lock();
                if items.len() < self.capacity {
                    if let Some(msg) = msg.take() {
                        items.push_back(Queued {
                            cancel: cancel.clone(),
                            msg,
                        });
                    }
                    drop(items);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
            }
        }
    }

    /// Appends without waiting. Hands the message back when full.
    pub fn try_push(&self, cancel: CancellationToken, msg: M) -> Result<(), M> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(msg);
        }
        items.push_back(Queued { cancel, msg });
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Next message in FIFO order. `None` once `stop` is cancelled.
    pub async fn pop(&self, stop: &CancellationToken) -> Option<Queued<M>> {
        loop {
            if stop.is_cancelled() {
                return None;
            }
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(q) = self.lock().pop_front() {
                self.not_full.notify_one();
                return Some(q);
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = stop.cancelled() => return None,
            }
        }
    }

    /// Removes every queued message matching `pred`, returning how many
    /// were dropped.
    pub fn delete_where(&self, pred: impl Fn(&M) -> bool) -> usize {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|q| !pred(&q.msg));
        let removed = before - items.len();
        drop(items);
        for _ in 0..removed {
            self.not_full.notify_one();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order() {
        let q = MessageQueue::new(4);
        let stop = CancellationToken::new();
        for i in 0..3 {
            q.push(CancellationToken::new(), i).await.unwrap();
        }
        assert_eq!(q.pop(&stop).await.unwrap().msg, 0);
        assert_eq!(q.pop(&stop).await.unwrap().msg, 1);
        assert_eq!(q.pop(&stop).await.unwrap().msg, 2);
    }

    #[tokio::test]
    async fn full_queue_blocks_until_cancelled() {
        let q = MessageQueue::new(1);
        q.push(CancellationToken::new(), 1).await.unwrap();
        assert_eq!(q.try_push(CancellationToken::new(), 2), Err(2));

        let cancel = CancellationToken::new();
        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            c.cancel();
        });
        let err = q.push(cancel, 2).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled)));
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn full_queue_resumes_after_pop() {
        let q = Arc::new(MessageQueue::new(1));
        q.push(CancellationToken::new(), 1).await.unwrap();
        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.push(CancellationToken::new(), 2).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let stop = CancellationToken::new();
        assert_eq!(q.pop(&stop).await.unwrap().msg, 1);
        producer.await.unwrap().unwrap();
        assert_eq!(q.pop(&stop).await.unwrap().msg, 2);
    }

    #[tokio::test]
    async fn pop_returns_none_on_stop() {
        let q: MessageQueue<u8> = MessageQueue::new(1);
        let stop = CancellationToken::new();
        stop.cancel();
        assert!(q.pop(&stop).await.is_none());
    }

    #[tokio::test]
    async fn delete_where_drops_matches() {
        let q = MessageQueue::new(8);
        for i in 0..6 {
            q.push(CancellationToken::new(), i).await.unwrap();
        }
        assert_eq!(q.delete_where(|m| m % 2 == 0), 3);
        assert_eq!(q.len(), 3);
        let stop = CancellationToken::new();
        assert_eq!(q.pop(&stop).await.unwrap().msg, 1);
    }
}
