// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chat message model.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Sender id used for messages synthesized by the router.
pub const SYSTEM_SENDER: &str = "System";

/// Self-declared identifier of a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this is the reserved system sender id.
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A chat message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    sender_id: PeerId,
    body: String,
    /// ISO-8601 (RFC 3339) timestamp.
    timestamp: String,
}

impl ChatMessage {
    /// Create a message stamped with the current UTC time.
    pub fn new(sender_id: impl Into<PeerId>, body: impl Into<String>) -> Self {
        Self::with_timestamp(sender_id, body, now_timestamp())
    }

    /// Create a message with an explicit timestamp.
    pub fn with_timestamp(
        sender_id: impl Into<PeerId>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            body: body.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Create a router-originated message addressed back to one sender.
    pub fn system(body: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, body)
    }

    pub fn sender_id(&self) -> &PeerId {
        &self.sender_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// True if the router synthesized this message.
    pub fn is_system(&self) -> bool {
        self.sender_id.is_system()
    }
}

/// Current UTC time in RFC 3339 form with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message() {
        let msg = ChatMessage::system("Message sent to B");
        assert!(msg.is_system());
        assert_eq!(msg.sender_id().as_str(), "System");
        assert_eq!(msg.body(), "Message sent to B");
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let msg = ChatMessage::new("A", "hello");
        assert!(chrono::DateTime::parse_from_rfc3339(msg.timestamp()).is_ok());
        assert!(msg.timestamp().ends_with('Z'));
    }

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let msg = ChatMessage::with_timestamp("trader1", "Hello", "2026-01-01T00:00:00.000Z");
        let encoded = toml::to_string(&msg).expect("serialize");
        assert!(encoded.contains("sender_id = \"trader1\""));
    }
}
