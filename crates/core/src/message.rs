// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Bounded FIFO message queue (C1, §4.1) backing the state machine's event
//! loop. Producers (command callers, the dispatcher's completion posts)
//! hold a [`MessageSender`]; the state machine owns the single
//! [`MessageQueue`] receiver.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub type MessageSender<T> = mpsc::Sender<T>;

pub struct MessageQueue<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> MessageQueue<T> {
    pub fn bounded(capacity: usize) -> (MessageSender<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: rx })
    }

    /// Non-blocking pop; `Ok(None)` if the queue is currently empty.
    pub fn try_pop(&mut self) -> CoreResult<Option<T>> {
        match self.receiver.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(CoreError::QueueClosed),
        }
    }

    /// Block until a message arrives, or the queue is closed.
    pub async fn wait_pop(&mut self) -> CoreResult<T> {
        self.receiver.recv().await.ok_or(CoreError::QueueClosed)
    }

    /// Block until a message arrives or `duration` elapses, whichever
    /// comes first. `Ok(None)` on timeout.
    pub async fn wait_for(&mut self, duration: Duration) -> CoreResult<Option<T>> {
        match tokio::time::timeout(duration, self.receiver.recv()).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => Err(CoreError::QueueClosed),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
