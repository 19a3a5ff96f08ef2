// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded-time delivery of one message to one peer.

use crate::message::ChatMessage;
use crate::registry::Peer;
use crate::sink::{MessageSink, SinkError};
use std::time::Duration;
use thiserror::Error;

/// Default per-attempt delivery bound.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a delivery attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delivery failed: {0}")]
    Sink(#[from] SinkError),
}

/// Attempt a single write of `message` to `peer`'s sink.
///
/// The write is abandoned once `timeout` elapses; the sink must then be
/// treated as unusable. All outcomes are returned, never raised.
pub async fn deliver(
    peer: &Peer,
    message: ChatMessage,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    deliver_to(peer.sink().as_ref(), message, timeout).await
}

/// Attempt a single bounded write to a sink that may not be registered,
/// such as the connection a system reply goes back to.
pub async fn deliver_to(
    sink: &dyn MessageSink,
    message: ChatMessage,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    match tokio::time::timeout(timeout, sink.write(message)).await {
        Ok(result) => result.map_err(DeliveryError::from),
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    }
}
