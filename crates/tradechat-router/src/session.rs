// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer connection session.
//!
//! A session owns one inbound message stream and one outbound sink. It pumps
//! inbound messages into the router in arrival order until the stream ends,
//! the cancellation token fires, or a read fails. The connection's
//! registration is removed on every one of those paths, and also when the
//! session future itself is dropped mid-flight.

use crate::message::ChatMessage;
use crate::router::{MessageRouter, RouterConnection, RouterError};
use crate::sink::MessageSink;
use futures::{Stream, StreamExt};
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Inbound stream error: {0}")]
    Inbound(Box<dyn StdError + Send + Sync>),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// One peer's connection session.
pub struct ConnectionSession {
    connection: RouterConnection,
    label: String,
}

impl ConnectionSession {
    /// Create a session whose routed output goes to `sink`.
    ///
    /// `label` identifies the connection in logs until the peer registers.
    pub fn new(router: &MessageRouter, sink: Arc<dyn MessageSink>, label: impl Into<String>) -> Self {
        Self {
            connection: router.connect(sink),
            label: label.into(),
        }
    }

    /// Run the session until input ends, `cancel` fires, or an error occurs.
    ///
    /// Cancellation stops the read loop; a message already being routed is
    /// allowed to finish its deliveries first.
    pub async fn run<S, E>(mut self, inbound: S, cancel: CancellationToken) -> Result<(), SessionError>
    where
        S: Stream<Item = Result<ChatMessage, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let mut inbound = std::pin::pin!(inbound);
        debug!("[{}] Session started", self.label);

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("[{}] Session cancelled", self.label);
                    break Ok(());
                }
                next = inbound.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    if let Err(e) = self.connection.route(message).await {
                        warn!("[{}] Routing error: {}", self.label, e);
                        break Err(SessionError::from(e));
                    }
                    if let Some(id) = self.connection.peer_id() {
                        if id.as_str() != self.label {
                            self.label = id.to_string();
                        }
                    }
                }
                Some(Err(e)) => {
                    info!("[{}] Inbound stream closed: {}", self.label, e);
                    break Err(SessionError::Inbound(Box::new(e)));
                }
                None => {
                    debug!("[{}] Inbound stream ended", self.label);
                    break Ok(());
                }
            }
        };

        self.connection.terminate();
        info!("[{}] Session ended", self.label);
        result
    }
}
