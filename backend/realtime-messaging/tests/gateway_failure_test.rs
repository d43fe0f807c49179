mod common;

use async_trait::async_trait;
use common::{frame, identity, store_with_users};
use realtime_messaging::error::{AppError, AppResult};
use realtime_messaging::models::{Message, MessageId, UserId};
use realtime_messaging::services::{ConnectionGraph, MemoryStore, MessageStore, Slice};
use realtime_messaging::websocket::MessagingGateway;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn outage() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

/// Graph whose pre-join lookup never completes
struct StalledGraph;

#[async_trait]
impl ConnectionGraph for StalledGraph {
    async fn exists(&self, _a: UserId, _b: UserId) -> AppResult<bool> {
        Ok(true)
    }

    async fn exists_all(&self, _user: UserId, _others: &[UserId]) -> AppResult<bool> {
        Ok(true)
    }

    async fn connected_among(
        &self,
        _user: UserId,
        _candidates: &[UserId],
    ) -> AppResult<HashSet<UserId>> {
        std::future::pending().await
    }
}

/// Memory store with switchable outages on the graph and on appends
struct Flaky {
    inner: Arc<MemoryStore>,
    graph_down: AtomicBool,
    append_down: AtomicBool,
}

impl Flaky {
    fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            graph_down: AtomicBool::new(false),
            append_down: AtomicBool::new(false),
        })
    }

    fn graph_fails(&self) -> AppResult<()> {
        if self.graph_down.load(Ordering::SeqCst) {
            Err(outage())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConnectionGraph for Flaky {
    async fn exists(&self, a: UserId, b: UserId) -> AppResult<bool> {
        self.graph_fails()?;
        self.inner.exists(a, b).await
    }

    async fn exists_all(&self, user: UserId, others: &[UserId]) -> AppResult<bool> {
        self.graph_fails()?;
        self.inner.exists_all(user, others).await
    }

    async fn connected_among(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> AppResult<HashSet<UserId>> {
        self.graph_fails()?;
        self.inner.connected_among(user, candidates).await
    }
}

#[async_trait]
impl MessageStore for Flaky {
    async fn append(&self, from: UserId, to: UserId, body: &str) -> AppResult<Message> {
        if self.append_down.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.append(from, to, body).await
    }

    async fn range_by_conversation(
        &self,
        a: UserId,
        b: UserId,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        self.inner.range_by_conversation(a, b, cursor, limit).await
    }

    async fn latest_per_counterpart(
        &self,
        user: UserId,
        search: Option<&str>,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        self.inner
            .latest_per_counterpart(user, search, cursor, limit)
            .await
    }
}

async fn flaky_gateway(ids: &[i64]) -> (Arc<MemoryStore>, Arc<Flaky>, MessagingGateway) {
    let store = store_with_users(ids).await;
    let flaky = Flaky::new(store.clone());
    let gw = MessagingGateway::new(flaky.clone(), flaky.clone(), store.clone());
    (store, flaky, gw)
}

fn assert_internal(reply: &serde_json::Value, ack: u64) {
    assert_eq!(reply["event"], "ack");
    assert_eq!(reply["ack"], ack);
    assert_eq!(reply["data"]["success"], false);
    assert_eq!(reply["data"]["message"], "internal error");
    assert!(reply["data"].get("errors").is_none());
    assert!(reply["data"].get("body").is_none());
}

#[tokio::test]
async fn cancelled_connect_leaves_no_presence_or_rooms() {
    let store = store_with_users(&[7]).await;
    let gw = MessagingGateway::new(Arc::new(StalledGraph), store.clone(), store.clone());

    let attempt = tokio::time::timeout(Duration::from_millis(50), gw.connect(identity(7))).await;
    assert!(attempt.is_err());

    assert!(!gw.presence().is_online(UserId(7)));
    assert_eq!(gw.presence().online_count(), 0);
    assert_eq!(gw.rooms().room_count(), 0);
}

#[tokio::test]
async fn graph_outage_during_send_is_an_internal_error_and_connection_survives() {
    let (store, flaky, gw) = flaky_gateway(&[1, 2]).await;
    store.link(UserId(1), UserId(2)).await.unwrap();
    let (alice, _alice_rx) = gw.connect(identity(1)).await;
    let (_bob, mut bob_rx) = gw.connect(identity(2)).await;

    flaky.graph_down.store(true, Ordering::SeqCst);
    let reply = frame(
        &gw.handle_frame(
            &alice,
            r#"{"event":"sendMessage","ack":1,"data":{"to_user_id":"2","message":"hi"}}"#,
        )
        .await
        .unwrap(),
    );
    assert_internal(&reply, 1);
    assert!(alice.is_active());
    assert_eq!(store.message_count().await, 0);
    assert!(bob_rx.try_recv().is_err());

    flaky.graph_down.store(false, Ordering::SeqCst);
    let reply = frame(
        &gw.handle_frame(
            &alice,
            r#"{"event":"sendMessage","ack":2,"data":{"to_user_id":"2","message":"hi again"}}"#,
        )
        .await
        .unwrap(),
    );
    assert_eq!(reply["data"]["success"], true);
    assert_eq!(frame(&bob_rx.try_recv().unwrap())["data"]["message"], "hi again");
}

#[tokio::test]
async fn graph_outage_during_join_is_an_internal_error() {
    let (store, flaky, gw) = flaky_gateway(&[1, 2]).await;
    store.link(UserId(1), UserId(2)).await.unwrap();
    let (alice, _rx) = gw.connect(identity(1)).await;

    flaky.graph_down.store(true, Ordering::SeqCst);
    let reply = frame(
        &gw.handle_frame(&alice, r#"{"event":"joinChatRooms","ack":9,"data":{"user_ids":["2"]}}"#)
            .await
            .unwrap(),
    );
    assert_internal(&reply, 9);
    assert_eq!(gw.rooms().rooms_of(alice.id).len(), 1);
}

#[tokio::test]
async fn store_outage_is_reported_without_an_ack_id_as_an_error_event() {
    let (store, flaky, gw) = flaky_gateway(&[1, 2]).await;
    store.link(UserId(1), UserId(2)).await.unwrap();
    let (alice, _rx) = gw.connect(identity(1)).await;

    flaky.append_down.store(true, Ordering::SeqCst);
    let reply = frame(
        &gw.handle_frame(
            &alice,
            r#"{"event":"sendMessage","data":{"to_user_id":"2","message":"lost"}}"#,
        )
        .await
        .unwrap(),
    );
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["message"], "internal error");
    assert!(reply["data"].get("errors").is_none());

    flaky.append_down.store(false, Ordering::SeqCst);
    let reply = frame(
        &gw.handle_frame(
            &alice,
            r#"{"event":"sendMessage","ack":3,"data":{"to_user_id":"2","message":"kept"}}"#,
        )
        .await
        .unwrap(),
    );
    assert_eq!(reply["data"]["success"], true);
    assert_eq!(store.message_count().await, 1);
}

#[tokio::test]
async fn failed_connect_lookup_still_goes_live_with_mailbox_only() {
    let (store, flaky, gw) = flaky_gateway(&[1, 2]).await;
    store.link(UserId(1), UserId(2)).await.unwrap();
    let (_bob, _bob_rx) = gw.connect(identity(2)).await;

    flaky.graph_down.store(true, Ordering::SeqCst);
    let (alice, _rx) = gw.connect(identity(1)).await;

    assert!(alice.is_active());
    assert!(gw.presence().is_online(UserId(1)));
    assert_eq!(gw.rooms().rooms_of(alice.id).len(), 1);
}

#[tokio::test]
async fn missing_profile_after_persist_is_an_internal_error() {
    // User 2 is linked but has no profile row
    let store = store_with_users(&[1]).await;
    store.link(UserId(1), UserId(2)).await.unwrap();
    let gw = MessagingGateway::new(store.clone(), store.clone(), store.clone());
    let (alice, mut alice_rx) = gw.connect(identity(1)).await;
    let (_bob, mut bob_rx) = gw.connect(identity(2)).await;

    let reply = frame(
        &gw.handle_frame(
            &alice,
            r#"{"event":"sendMessage","ack":4,"data":{"to_user_id":"2","message":"hello?"}}"#,
        )
        .await
        .unwrap(),
    );
    assert_internal(&reply, 4);

    // Persisted, but nothing is pushed with a half-built view
    assert_eq!(store.message_count().await, 1);
    assert!(bob_rx.try_recv().is_err());
    assert!(alice_rx.try_recv().is_err());
    assert!(alice.is_active());

    let reply = frame(
        &gw.handle_frame(&alice, r#"{"event":"sendTyping","ack":5,"data":{"to_user_id":"2"}}"#)
            .await
            .unwrap(),
    );
    assert_eq!(reply["data"]["success"], true);
}
