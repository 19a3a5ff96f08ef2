// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core router implementation.
//!
//! [`MessageRouter`] is shared by every connection. Each connection drives
//! its own [`RouterConnection`], which walks the lifecycle
//! `Unregistered -> Active -> Terminated`:
//!
//! - the first inbound message registers its sender id against the
//!   connection's sink,
//! - every message (the first included) is then classified and either
//!   broadcast to a registry snapshot or sent to a single peer,
//! - termination removes the connection's own registration, unless a newer
//!   connection has since taken over the id.

use crate::command::{Command, DIRECT_USAGE};
use crate::config::RouterConfig;
use crate::delivery::{deliver, deliver_to, DeliveryError};
use crate::message::{ChatMessage, PeerId};
use crate::registry::{Generation, Peer, PeerRegistry};
use crate::sink::MessageSink;
use crate::stats::{RouterStats, RouterStatsSnapshot};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Connection already terminated")]
    Terminated,

    #[error("Reply to sender failed: {0}")]
    ReplyFailed(DeliveryError),
}

/// Lifecycle of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No message seen yet.
    Unregistered,

    /// Registered under `id`.
    Active { id: PeerId, generation: Generation },

    /// Input ended; no further messages are processed.
    Terminated,
}

/// What routing one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Fanned out to a snapshot of the registry.
    Broadcast {
        delivered: usize,
        evicted: Vec<PeerId>,
    },

    /// Sent to a single registered peer.
    Directed { target: PeerId, delivered: bool },

    /// Direct message to an id that is not registered.
    TargetNotFound { target: PeerId },

    /// `/to` without target or payload.
    Malformed,

    /// First message carried an unusable sender id; nothing registered.
    Rejected,
}

struct RouterInner {
    config: RouterConfig,
    registry: Arc<PeerRegistry>,
    stats: RouterStats,
}

/// Shared message router. Cheap to clone.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl MessageRouter {
    /// Create a router with its own empty registry.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                config,
                registry: Arc::new(PeerRegistry::new()),
                stats: RouterStats::new(),
            }),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.inner.registry
    }

    /// Get router statistics.
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn delivery_timeout(&self) -> Duration {
        self.inner.config.delivery_timeout()
    }

    /// Open routing state for a new connection writing to `sink`.
    pub fn connect(&self, sink: Arc<dyn MessageSink>) -> RouterConnection {
        RouterConnection {
            router: self.clone(),
            sink,
            state: ConnectionState::Unregistered,
        }
    }

    /// Classify and route one message on behalf of the connection owning `reply_sink`.
    async fn dispatch(
        &self,
        message: ChatMessage,
        reply_sink: &Arc<dyn MessageSink>,
    ) -> Result<RouteOutcome, RouterError> {
        RouterStats::incr(&self.inner.stats.messages_routed);

        match Command::parse(message.body()) {
            Command::Broadcast => Ok(self.broadcast(message).await),
            Command::Directed { target, text } => {
                let target = PeerId::from(target);
                let private = ChatMessage::with_timestamp(
                    message.sender_id().clone(),
                    format!("[Private] {text}"),
                    message.timestamp(),
                );
                self.send_direct(target, private, reply_sink).await
            }
            Command::Malformed => {
                debug!("Malformed direct message from '{}'", message.sender_id());
                self.reply(reply_sink, DIRECT_USAGE).await?;
                Ok(RouteOutcome::Malformed)
            }
        }
    }

    /// Deliver `message` to every peer in a registry snapshot, sender included.
    ///
    /// Attempts run concurrently; failed peers are evicted once all attempts
    /// have finished.
    async fn broadcast(&self, message: ChatMessage) -> RouteOutcome {
        RouterStats::incr(&self.inner.stats.broadcasts);

        let peers = self.inner.registry.snapshot();
        let timeout = self.delivery_timeout();

        let attempts = peers.into_values().map(|peer| {
            let message = message.clone();
            async move {
                let result = deliver(&peer, message, timeout).await;
                (peer, result)
            }
        });

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (peer, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    RouterStats::incr(&self.inner.stats.deliveries);
                    delivered += 1;
                }
                Err(e) => {
                    RouterStats::incr(&self.inner.stats.delivery_failures);
                    warn!("Broadcast to '{}' failed: {}", peer.id(), e);
                    failed.push(peer);
                }
            }
        }

        let evicted = failed
            .iter()
            .filter(|peer| self.evict(peer))
            .map(|peer| peer.id().clone())
            .collect();

        debug!(
            "Broadcast from '{}' delivered to {} peer(s)",
            message.sender_id(),
            delivered
        );

        RouteOutcome::Broadcast { delivered, evicted }
    }

    /// Deliver a private message to `target` and confirm to the sender.
    ///
    /// A failed delivery is treated as the target's disconnection: the
    /// target is evicted and the sender is not told.
    async fn send_direct(
        &self,
        target: PeerId,
        private: ChatMessage,
        reply_sink: &Arc<dyn MessageSink>,
    ) -> Result<RouteOutcome, RouterError> {
        RouterStats::incr(&self.inner.stats.direct_messages);

        // Resolve under the lock, deliver outside it.
        let Some(peer) = self.inner.registry.lookup(target.as_str()) else {
            debug!("Direct message target '{}' not found", target);
            self.reply(reply_sink, format!("User '{target}' not found or offline"))
                .await?;
            return Ok(RouteOutcome::TargetNotFound { target });
        };

        match deliver(&peer, private, self.delivery_timeout()).await {
            Ok(()) => {
                RouterStats::incr(&self.inner.stats.deliveries);
                self.reply(reply_sink, format!("Message sent to {target}"))
                    .await?;
                Ok(RouteOutcome::Directed {
                    target,
                    delivered: true,
                })
            }
            Err(e) => {
                RouterStats::incr(&self.inner.stats.delivery_failures);
                warn!("Direct message to '{}' failed: {}", target, e);
                self.evict(&peer);
                Ok(RouteOutcome::Directed {
                    target,
                    delivered: false,
                })
            }
        }
    }

    /// Send a system message back to the originating connection only.
    async fn reply(
        &self,
        reply_sink: &Arc<dyn MessageSink>,
        text: impl Into<String>,
    ) -> Result<(), RouterError> {
        deliver_to(
            reply_sink.as_ref(),
            ChatMessage::system(text),
            self.delivery_timeout(),
        )
        .await
        .map_err(RouterError::ReplyFailed)
    }

    /// Remove a peer after a failed delivery, unless it was re-registered since.
    fn evict(&self, peer: &Peer) -> bool {
        let removed = self
            .inner
            .registry
            .unregister_if(peer.id().as_str(), peer.generation());
        if removed {
            RouterStats::incr(&self.inner.stats.evictions);
            warn!("Evicted peer '{}' after failed delivery", peer.id());
        }
        removed
    }
}

/// Routing state for one connection.
///
/// Dropping it has the same effect as [`RouterConnection::terminate`].
pub struct RouterConnection {
    router: MessageRouter,
    sink: Arc<dyn MessageSink>,
    state: ConnectionState,
}

impl RouterConnection {
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Id this connection registered under, if any.
    pub fn peer_id(&self) -> Option<&PeerId> {
        match &self.state {
            ConnectionState::Active { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Route one inbound message, registering its sender first if this is
    /// the connection's first message.
    pub async fn route(&mut self, message: ChatMessage) -> Result<RouteOutcome, RouterError> {
        match self.state {
            ConnectionState::Terminated => return Err(RouterError::Terminated),
            ConnectionState::Active { .. } => {}
            ConnectionState::Unregistered => {
                if let Some(reason) = rejection(message.sender_id()) {
                    debug!("Rejected first message: {}", reason);
                    self.router.reply(&self.sink, reason).await?;
                    return Ok(RouteOutcome::Rejected);
                }
                self.register(message.sender_id().clone());
            }
        }

        self.router.dispatch(message, &self.sink).await
    }

    fn register(&mut self, id: PeerId) {
        let registry = self.router.registry();
        let generation = registry.register(id.clone(), self.sink.clone());
        RouterStats::incr(&self.router.inner.stats.registrations);
        info!(
            "[{}] Connected ({} peer(s) online)",
            id,
            registry.len()
        );
        self.state = ConnectionState::Active { id, generation };
    }

    /// Enter the terminal state, removing this connection's registration.
    ///
    /// Idempotent: only the first call has any effect.
    pub fn terminate(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Terminated);
        if let ConnectionState::Active { id, generation } = previous {
            if self
                .router
                .registry()
                .unregister_if(id.as_str(), generation)
            {
                info!("[{}] Disconnected", id);
            } else {
                debug!("[{}] Disconnected (registration already replaced or evicted)", id);
            }
        }
    }
}

impl Drop for RouterConnection {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Reason a first message cannot register its sender.
fn rejection(id: &PeerId) -> Option<String> {
    if id.as_str().trim().is_empty() {
        Some("Sender id is required".to_string())
    } else if id.is_system() {
        Some(format!("Sender id '{id}' is reserved"))
    } else {
        None
    }
}
