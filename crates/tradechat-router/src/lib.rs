// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tradechat message router
//!
//! Routes chat messages between concurrently connected peers.
//!
//! # Features
//!
//! - **Peer Registry**: live map of peer id to outbound sink, last registration wins
//! - **Broadcast**: every message goes to all registered peers, sender included
//! - **Direct Messages**: `/to <peer> <text>` delivers to a single peer
//! - **Eviction**: peers whose delivery fails or times out are unregistered
//! - **Sessions**: one task per connection, registration removed on every exit path
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//! use tradechat_router::{ChatMessage, ConnectionSession, MessageRouter, RouterConfig};
//!
//! # async fn example() -> Result<(), tradechat_router::SessionError> {
//! let router = MessageRouter::new(RouterConfig::default());
//!
//! // Outbound side: the transport drains `rx` and writes to the peer.
//! let (tx, _rx) = mpsc::channel::<ChatMessage>(256);
//!
//! // Inbound side: any stream of `Result<ChatMessage, E>`.
//! let inbound = futures::stream::iter(vec![
//!     Ok::<_, std::io::Error>(ChatMessage::new("trader1", "hello")),
//!     Ok(ChatMessage::new("trader1", "/to trader2 buy 100")),
//! ]);
//!
//! ConnectionSession::new(&router, Arc::new(tx), "conn-1")
//!     .run(inbound, CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! name = "desk-chat"
//! delivery_timeout_ms = 5000
//! ```

pub mod command;
pub mod config;
pub mod delivery;
pub mod message;
pub mod registry;
pub mod router;
pub mod session;
pub mod sink;
pub mod stats;

pub use command::Command;
pub use config::{ConfigError, RouterConfig};
pub use delivery::{deliver, deliver_to, DeliveryError, DEFAULT_DELIVERY_TIMEOUT};
pub use message::{ChatMessage, PeerId, SYSTEM_SENDER};
pub use registry::{Generation, Peer, PeerRegistry};
pub use router::{ConnectionState, MessageRouter, RouteOutcome, RouterConnection, RouterError};
pub use session::{ConnectionSession, SessionError};
pub use sink::{MessageSink, SinkError, SinkFuture};
pub use stats::{RouterStats, RouterStatsSnapshot};
