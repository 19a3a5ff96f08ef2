// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket protocol messages for the chat server.
//!
//! JSON-based protocol, one message per text frame.

use serde::{Deserialize, Serialize};
use tradechat_router::ChatMessage;

/// Client → Server messages
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat message to route
    Chat {
        sender_id: String,
        body: String,
        /// RFC 3339 timestamp; stamped on arrival when absent
        #[serde(default)]
        timestamp: Option<String>,
    },

    /// Ping (keepalive)
    Ping {
        #[serde(default)]
        id: Option<u64>,
    },
}

/// Server → Client messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Welcome message on connection
    Welcome { version: String },

    /// Routed chat message
    Chat {
        sender_id: String,
        body: String,
        timestamp: String,
    },

    /// Pong response
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },

    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
    /// Frame type the server does not handle
    UnsupportedMessage,
}

impl ServerMessage {
    /// Create a welcome message
    pub fn welcome() -> Self {
        Self::Welcome {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Create an error message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<&ChatMessage> for ServerMessage {
    fn from(message: &ChatMessage) -> Self {
        Self::Chat {
            sender_id: message.sender_id().to_string(),
            body: message.body().to_string(),
            timestamp: message.timestamp().to_string(),
        }
    }
}

impl ClientMessage {
    /// Convert a `chat` message into a routable [`ChatMessage`].
    ///
    /// Returns `None` for control messages.
    pub fn into_chat(self) -> Option<ChatMessage> {
        match self {
            Self::Chat {
                sender_id,
                body,
                timestamp: Some(timestamp),
            } => Some(ChatMessage::with_timestamp(sender_id, body, timestamp)),
            Self::Chat {
                sender_id,
                body,
                timestamp: None,
            } => Some(ChatMessage::new(sender_id, body)),
            Self::Ping { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat() {
        let json = r#"{"type": "chat", "sender_id": "trader1", "body": "/to trader2 hi"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Chat {
                ref sender_id,
                ref body,
                ref timestamp,
            } => {
                assert_eq!(sender_id, "trader1");
                assert_eq!(body, "/to trader2 hi");
                assert!(timestamp.is_none());
            }
            _ => panic!("Expected Chat"),
        }

        let chat = msg.into_chat().unwrap();
        assert_eq!(chat.sender_id().as_str(), "trader1");
        assert!(!chat.timestamp().is_empty());
    }

    #[test]
    fn parse_chat_keeps_client_timestamp() {
        let json = r#"{"type": "chat", "sender_id": "A", "body": "hi", "timestamp": "2024-01-02T03:04:05.000Z"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let chat = msg.into_chat().unwrap();
        assert_eq!(chat.timestamp(), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn parse_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "ping", "id": 7}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { id: Some(7) });
        assert!(msg.into_chat().is_none());

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { id: None });
    }

    #[test]
    fn reject_unknown_type() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type": "subscribe"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serialize_chat_message() {
        let chat = ChatMessage::with_timestamp("System", "Message sent to B", "2024-01-02T03:04:05.000Z");
        let json = serde_json::to_value(ServerMessage::from(&chat)).unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["sender_id"], "System");
        assert_eq!(json["body"], "Message sent to B");
        assert_eq!(json["timestamp"], "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn serialize_error_and_pong() {
        let json = serde_json::to_string(&ServerMessage::error(ErrorCode::InvalidMessage, "bad")).unwrap();
        assert!(json.contains("\"INVALID_MESSAGE\""));

        let json = serde_json::to_string(&ServerMessage::Pong { id: None }).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
