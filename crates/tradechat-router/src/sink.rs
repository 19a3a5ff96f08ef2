// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound message sinks.
//!
//! The router never owns a peer's network connection, only a handle that
//! accepts messages for it. A write may fail or stall; bounding it in time
//! is the delivery layer's job.

use crate::message::ChatMessage;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// Future returned by [`MessageSink::write`].
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Errors raised by a sink write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Stream closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Write side of one peer's connection.
pub trait MessageSink: Send + Sync {
    /// Push a message towards the peer.
    fn write(&self, message: ChatMessage) -> SinkFuture<'_>;
}

/// Channel-backed sink; the receiving half is drained by the transport.
///
/// A full channel makes the write wait for capacity, a dropped receiver
/// makes it fail with [`SinkError::Closed`].
impl MessageSink for mpsc::Sender<ChatMessage> {
    fn write(&self, message: ChatMessage) -> SinkFuture<'_> {
        Box::pin(async move {
            self.send(message).await.map_err(|_| SinkError::Closed)
        })
    }
}
