// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-band command syntax carried in message bodies.
//!
//! A body of the form `/to <target> <text>` addresses a single peer.
//! Anything else is broadcast to every connected peer.

/// Command prefix for direct messages.
pub const DIRECT_PREFIX: &str = "/to";

/// Usage hint sent back on malformed direct messages.
pub const DIRECT_USAGE: &str = "Invalid direct message format. Use: /to <user> <message>";

/// Classification of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Deliver to every registered peer.
    Broadcast,

    /// Deliver to exactly one peer.
    Directed { target: &'a str, text: &'a str },

    /// Starts with `/to` but lacks a target or payload.
    Malformed,
}

impl<'a> Command<'a> {
    /// Classify a message body.
    pub fn parse(body: &'a str) -> Self {
        let trimmed = body.trim_start();
        let rest = match split_token(trimmed) {
            Some((DIRECT_PREFIX, rest)) => rest,
            _ => return Self::Broadcast,
        };

        let Some((target, rest)) = split_token(rest) else {
            return Self::Malformed;
        };

        let text = rest.trim_start();
        if text.trim_end().is_empty() {
            return Self::Malformed;
        }

        Self::Directed { target, text }
    }
}

/// Split off the first whitespace-delimited token.
fn split_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(pos) => Some((&input[..pos], &input[pos..])),
        None => Some((input, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_broadcast() {
        assert_eq!(Command::parse("hello"), Command::Broadcast);
        assert_eq!(Command::parse(""), Command::Broadcast);
        assert_eq!(Command::parse("say /to B hi"), Command::Broadcast);
    }

    #[test]
    fn test_prefix_must_be_whole_token() {
        assert_eq!(Command::parse("/toB hi"), Command::Broadcast);
        assert_eq!(Command::parse("/tour of the market"), Command::Broadcast);
    }

    #[test]
    fn test_directed() {
        assert_eq!(
            Command::parse("/to B hi"),
            Command::Directed {
                target: "B",
                text: "hi"
            }
        );
    }

    #[test]
    fn test_directed_keeps_inner_spacing() {
        assert_eq!(
            Command::parse("/to   trader2   buy  100 AAPL"),
            Command::Directed {
                target: "trader2",
                text: "buy  100 AAPL"
            }
        );
    }

    #[test]
    fn test_malformed() {
        assert_eq!(Command::parse("/to"), Command::Malformed);
        assert_eq!(Command::parse("/to B"), Command::Malformed);
        assert_eq!(Command::parse("/to B   "), Command::Malformed);
    }
}
