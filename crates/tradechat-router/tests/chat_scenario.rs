// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end routing across concurrently running sessions.

use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tradechat_router::{
    ChatMessage, ConnectionSession, MessageRouter, MessageSink, RouterConfig, SessionError,
    SinkError, SinkFuture,
};

const WAIT: Duration = Duration::from_secs(2);

/// Test-side handle on one connected peer.
struct Client {
    inbound: mpsc::Sender<Result<ChatMessage, Infallible>>,
    outbound: mpsc::Receiver<ChatMessage>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), SessionError>>,
}

impl Client {
    fn connect(router: &MessageRouter, label: &str) -> Self {
        let (out_tx, outbound) = mpsc::channel::<ChatMessage>(32);
        let (in_tx, in_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let session = ConnectionSession::new(router, Arc::new(out_tx), label);
        let task = tokio::spawn(session.run(stream_of(in_rx), cancel.clone()));
        Self {
            inbound: in_tx,
            outbound,
            cancel,
            task,
        }
    }

    async fn send(&self, sender: &str, body: &str) {
        self.inbound
            .send(Ok(ChatMessage::new(sender, body)))
            .await
            .expect("session alive");
    }

    async fn recv(&mut self) -> ChatMessage {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("message within timeout")
            .expect("channel open")
    }

    /// Assert nothing else arrives within a short window.
    async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.outbound.recv()).await;
        assert!(next.is_err(), "unexpected message: {:?}", next);
    }

    async fn close(self) -> Result<(), SessionError> {
        drop(self.inbound);
        self.task.await.expect("join")
    }
}

fn stream_of(
    rx: mpsc::Receiver<Result<ChatMessage, Infallible>>,
) -> impl Stream<Item = Result<ChatMessage, Infallible>> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

async fn wait_for(router: &MessageRouter, id: &str, present: bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while router.registry().lookup(id).is_some() != present {
        assert!(
            tokio::time::Instant::now() < deadline,
            "'{id}' presence never became {present}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn router() -> MessageRouter {
    MessageRouter::new(RouterConfig::default().delivery_timeout_ms(100))
}

#[tokio::test]
async fn test_broadcast_direct_and_disconnect() {
    let router = router();
    let mut a = Client::connect(&router, "conn-a");
    let mut b = Client::connect(&router, "conn-b");

    // B announces itself first so that A's broadcast reaches it.
    b.send("B", "joined").await;
    assert_eq!(b.recv().await.body(), "joined");
    wait_for(&router, "B", true).await;

    a.send("A", "hello").await;
    for client in [&mut a, &mut b] {
        let msg = client.recv().await;
        assert_eq!(msg.sender_id().as_str(), "A");
        assert_eq!(msg.body(), "hello");
    }

    a.send("A", "/to B hi").await;
    let private = b.recv().await;
    assert_eq!(private.sender_id().as_str(), "A");
    assert_eq!(private.body(), "[Private] hi");
    let confirm = a.recv().await;
    assert!(confirm.is_system());
    assert_eq!(confirm.body(), "Message sent to B");

    a.send("A", "/to C hi").await;
    let missing = a.recv().await;
    assert!(missing.is_system());
    assert_eq!(missing.body(), "User 'C' not found or offline");
    b.assert_quiet().await;

    b.close().await.expect("b session");
    assert!(router.registry().lookup("B").is_none());

    a.send("A", "anyone?").await;
    assert_eq!(a.recv().await.body(), "anyone?");
    assert_eq!(router.registry().peer_ids(), vec!["A".into()]);

    let stats = router.stats();
    assert_eq!(stats.evictions, 0);
    assert_eq!(stats.registrations, 2);

    a.close().await.expect("a session");
    assert!(router.registry().is_empty());
}

#[tokio::test]
async fn test_per_sender_order_is_preserved() {
    let router = router();
    let mut a = Client::connect(&router, "conn-a");
    let mut b = Client::connect(&router, "conn-b");

    b.send("B", "ready").await;
    assert_eq!(b.recv().await.body(), "ready");
    wait_for(&router, "B", true).await;

    for i in 0..20 {
        a.send("A", &format!("msg-{i}")).await;
    }
    for i in 0..20 {
        assert_eq!(b.recv().await.body(), format!("msg-{i}"));
        assert_eq!(a.recv().await.body(), format!("msg-{i}"));
    }

    a.cancel.cancel();
    b.cancel.cancel();
    a.task.await.expect("join").expect("a session");
    b.task.await.expect("join").expect("b session");
    assert!(router.registry().is_empty());
}

struct BrokenSink;

impl MessageSink for BrokenSink {
    fn write(&self, _message: ChatMessage) -> SinkFuture<'_> {
        Box::pin(async { Err(SinkError::Transport("Connection lost".into())) })
    }
}

#[tokio::test]
async fn test_failing_peer_is_evicted_others_still_served() {
    let router = router();
    let mut a = Client::connect(&router, "conn-a");
    let mut c = Client::connect(&router, "conn-c");

    // Registered straight into the registry: no session reads for "X".
    router.registry().register("X".into(), Arc::new(BrokenSink));

    c.send("C", "here").await;
    assert_eq!(c.recv().await.body(), "here");
    wait_for(&router, "X", false).await;

    router.registry().register("X".into(), Arc::new(BrokenSink));
    a.send("A", "hello").await;
    assert_eq!(a.recv().await.body(), "hello");
    assert_eq!(c.recv().await.body(), "hello");
    wait_for(&router, "X", false).await;
    assert!(router.stats().evictions >= 2);

    a.close().await.expect("a session");
    c.close().await.expect("c session");
}

#[tokio::test]
async fn test_stalled_peer_is_evicted_after_timeout() {
    let router = router();
    let mut a = Client::connect(&router, "conn-a");

    // A peer whose outbound buffer is full and never drained.
    let (slow_tx, _slow_rx) = mpsc::channel::<ChatMessage>(1);
    slow_tx
        .try_send(ChatMessage::new("backlog", "x"))
        .expect("fill");
    router.registry().register("S".into(), Arc::new(slow_tx));

    a.send("A", "tick").await;
    assert_eq!(a.recv().await.body(), "tick");
    wait_for(&router, "S", false).await;

    a.send("A", "/to S ping").await;
    assert_eq!(a.recv().await.body(), "User 'S' not found or offline");

    a.close().await.expect("a session");
}

#[tokio::test]
async fn test_reconnect_under_same_id_survives_old_disconnect() {
    let router = router();
    let mut old = Client::connect(&router, "conn-old");
    old.send("A", "first").await;
    assert_eq!(old.recv().await.body(), "first");

    let mut new = Client::connect(&router, "conn-new");
    new.send("A", "second").await;
    assert_eq!(new.recv().await.body(), "second");

    old.close().await.expect("old session");

    let mut b = Client::connect(&router, "conn-b");
    b.send("B", "/to A still there?").await;
    assert_eq!(new.recv().await.body(), "[Private] still there?");
    assert_eq!(b.recv().await.body(), "Message sent to A");

    new.close().await.expect("new session");
    b.close().await.expect("b session");
    assert!(router.registry().is_empty());
}
