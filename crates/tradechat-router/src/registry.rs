// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry of connected peers.
//!
//! Maps each [`PeerId`] to the sink currently registered for it. A later
//! registration under the same id replaces the earlier one. Every
//! registration is stamped with a [`Generation`] so that cleanup performed
//! on behalf of a replaced connection cannot remove its successor.
//!
//! The lock is only held for map operations, never across a delivery.
//! Fan-out iterates over a [`PeerRegistry::snapshot`] instead.

use crate::message::PeerId;
use crate::sink::MessageSink;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registration stamp, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

/// A registered peer: its id and a handle to write to it.
#[derive(Clone)]
pub struct Peer {
    id: PeerId,
    sink: Arc<dyn MessageSink>,
    generation: Generation,
}

impl Peer {
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True if both handles point at the same sink.
    pub fn same_sink(&self, sink: &Arc<dyn MessageSink>) -> bool {
        Arc::ptr_eq(&self.sink, sink)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Concurrency-safe peer registry.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerId, Peer>>,
    next_generation: AtomicU64,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`.
    ///
    /// Returns the generation stamped on the new entry.
    pub fn register(&self, id: PeerId, sink: Arc<dyn MessageSink>) -> Generation {
        let generation = Generation(self.next_generation.fetch_add(1, Ordering::Relaxed));
        let peer = Peer {
            id: id.clone(),
            sink,
            generation,
        };
        self.peers.lock().insert(id, peer);
        generation
    }

    /// Remove the entry for `id` if present.
    pub fn unregister(&self, id: &str) -> bool {
        self.peers.lock().remove(id).is_some()
    }

    /// Remove the entry for `id` only if it still carries `generation`.
    pub fn unregister_if(&self, id: &str, generation: Generation) -> bool {
        let mut peers = self.peers.lock();
        if peers.get(id).map(|p| p.generation) == Some(generation) {
            peers.remove(id);
            true
        } else {
            false
        }
    }

    /// Current peer registered under `id`.
    pub fn lookup(&self, id: &str) -> Option<Peer> {
        self.peers.lock().get(id).cloned()
    }

    /// Point-in-time copy of the registry.
    pub fn snapshot(&self) -> HashMap<PeerId, Peer> {
        self.peers.lock().clone()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Registered peer ids, sorted.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<_> = self.peers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}
