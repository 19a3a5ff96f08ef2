// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket client session management.
//!
//! Each connected WebSocket client gets a session that:
//! - Decodes JSON frames into chat messages for the router
//! - Answers pings and reports malformed frames
//! - Forwards routed messages back to the socket as JSON

use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::{future, Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tradechat_router::{ChatMessage, ConnectionSession, MessageRouter, SessionError};
use uuid::Uuid;

/// Queue depth for replies generated by the session itself (pong, errors).
const CONTROL_BUFFER: usize = 16;

/// How long queued frames may take to reach the socket once the session ends.
const FORWARD_DRAIN: Duration = Duration::from_secs(1);

/// What a single inbound frame asks the session to do.
#[derive(Debug)]
enum Inbound {
    /// Route this message.
    Chat(ChatMessage),
    /// Answer the client directly, bypassing the router.
    Reply(ServerMessage),
    /// Client closed the connection.
    Close,
    /// Nothing to do.
    Ignore,
}

/// A WebSocket client session
pub struct ClientSession {
    router: MessageRouter,
    outbound_buffer: usize,
    /// Session ID for logging
    session_id: String,
}

impl ClientSession {
    /// Create a new client session
    pub fn new(router: MessageRouter, outbound_buffer: usize) -> Self {
        let session_id = Uuid::new_v4().to_string()[..8].to_string();
        info!("[{}] New session created", session_id);

        Self {
            router,
            outbound_buffer,
            session_id,
        }
    }

    /// Run the session, handling messages until disconnect or `cancel`
    pub async fn run(
        self,
        socket: WebSocket,
        cancel: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (mut ws_tx, ws_rx) = socket.split();

        // Send welcome message
        let welcome_json = serde_json::to_string(&ServerMessage::welcome())?;
        ws_tx.send(Message::Text(welcome_json)).await?;

        // The router writes into `chat_tx`; a full queue stalls the write
        // until the delivery timeout evicts this peer.
        let (chat_tx, chat_rx) = mpsc::channel::<ChatMessage>(self.outbound_buffer);
        let (ctrl_tx, ctrl_rx) = mpsc::channel::<ServerMessage>(CONTROL_BUFFER);

        let ws_forward = tokio::spawn(forward_frames(
            ws_tx,
            chat_rx,
            ctrl_rx,
            self.session_id.clone(),
        ));

        let session_id = self.session_id.clone();
        let inbound = ws_rx
            .map(|frame| frame.map(decode_frame))
            .take_while(move |frame| {
                let open = !matches!(frame, Ok(Inbound::Close));
                if !open {
                    info!("[{}] Client closed connection", session_id);
                }
                future::ready(open)
            })
            .filter_map(move |frame| {
                let ctrl_tx = ctrl_tx.clone();
                async move {
                    match frame {
                        Ok(Inbound::Chat(message)) => Some(Ok(message)),
                        Ok(Inbound::Reply(reply)) => {
                            let _ = ctrl_tx.send(reply).await;
                            None
                        }
                        Ok(Inbound::Close) | Ok(Inbound::Ignore) => None,
                        Err(e) => Some(Err(e)),
                    }
                }
            });

        let result = ConnectionSession::new(&self.router, Arc::new(chat_tx), self.session_id.clone())
            .run(inbound, cancel)
            .await;

        // Both queue senders are gone with the session; let queued frames out.
        if !finish_forwarding(ws_forward, FORWARD_DRAIN).await {
            debug!("[{}] Outbound queue not drained, closing", self.session_id);
        }

        session_outcome(result, &self.session_id).map_err(Into::into)
    }
}

/// A read error means the client went away without a close handshake.
fn session_outcome(
    result: Result<(), SessionError>,
    session_id: &str,
) -> Result<(), SessionError> {
    match result {
        Err(SessionError::Inbound(e)) => {
            debug!("[{}] Connection dropped: {}", session_id, e);
            Ok(())
        }
        other => other,
    }
}

/// Wait up to `bound` for the forwarder to flush, then abort it.
///
/// Returns true if it finished on its own.
async fn finish_forwarding(mut ws_forward: JoinHandle<()>, bound: Duration) -> bool {
    match tokio::time::timeout(bound, &mut ws_forward).await {
        Ok(_) => true,
        Err(_) => {
            ws_forward.abort();
            false
        }
    }
}

/// Classify one WebSocket frame.
fn decode_frame(frame: Message) -> Inbound {
    match frame {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping { id }) => Inbound::Reply(ServerMessage::Pong { id }),
            Ok(msg) => match msg.into_chat() {
                Some(chat) => Inbound::Chat(chat),
                None => Inbound::Ignore,
            },
            Err(e) => {
                debug!("Rejected frame: {}", e);
                Inbound::Reply(ServerMessage::error(
                    ErrorCode::InvalidMessage,
                    format!("Invalid JSON: {}", e),
                ))
            }
        },
        Message::Binary(_) => {
            warn!("Binary messages not supported");
            Inbound::Reply(ServerMessage::error(
                ErrorCode::UnsupportedMessage,
                "Binary messages not supported",
            ))
        }
        Message::Close(_) => Inbound::Close,
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
    }
}

/// Write routed messages and session replies to the socket until both
/// queues close or the socket fails.
async fn forward_frames<W>(
    mut ws_tx: W,
    mut chat_rx: mpsc::Receiver<ChatMessage>,
    mut ctrl_rx: mpsc::Receiver<ServerMessage>,
    session_id: String,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        let msg = tokio::select! {
            Some(reply) = ctrl_rx.recv() => reply,
            Some(chat) = chat_rx.recv() => ServerMessage::from(&chat),
            else => break,
        };

        match serde_json::to_string(&msg) {
            Ok(json) => {
                if let Err(e) = ws_tx.send(Message::Text(json)).await {
                    debug!("[{}] WebSocket send failed, closing: {}", session_id, e);
                    break;
                }
            }
            Err(e) => {
                error!("[{}] Failed to serialize message: {}", session_id, e);
            }
        }
    }
}
