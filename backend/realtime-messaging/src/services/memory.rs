//! In-process storage for local development and tests (`STORAGE_BACKEND=memory`).

use super::connection_graph::ConnectionGraph;
use super::message_store::{reject_self_message, MessageStore, Slice};
use super::user_directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageId, UserId, UserProfile};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserProfile>,
    /// Undirected edges stored as (min, max)
    edges: HashSet<(UserId, UserId)>,
    /// Ascending by id
    chats: Vec<Message>,
    last_id: i64,
}

fn edge(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, profile: UserProfile) {
        self.inner.write().await.users.insert(profile.id, profile);
    }

    pub async fn link(&self, a: UserId, b: UserId) -> AppResult<()> {
        if a == b {
            return Err(AppError::BadRequest("cannot connect a user to themselves".into()));
        }
        self.inner.write().await.edges.insert(edge(a, b));
        Ok(())
    }

    pub async fn unlink(&self, a: UserId, b: UserId) {
        self.inner.write().await.edges.remove(&edge(a, b));
    }

    pub async fn message_count(&self) -> usize {
        self.inner.read().await.chats.len()
    }
}

#[async_trait]
impl ConnectionGraph for MemoryStore {
    async fn exists(&self, a: UserId, b: UserId) -> AppResult<bool> {
        Ok(a != b && self.inner.read().await.edges.contains(&edge(a, b)))
    }

    async fn exists_all(&self, user: UserId, others: &[UserId]) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(others
            .iter()
            .all(|&other| other != user && inner.edges.contains(&edge(user, other))))
    }

    async fn connected_among(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> AppResult<HashSet<UserId>> {
        let inner = self.inner.read().await;
        Ok(candidates
            .iter()
            .copied()
            .filter(|&other| other != user && inner.edges.contains(&edge(user, other)))
            .collect())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, from: UserId, to: UserId, body: &str) -> AppResult<Message> {
        reject_self_message(from, to)?;
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let message = Message {
            id: MessageId(inner.last_id),
            from_user_id: from,
            to_user_id: to,
            message: body.to_string(),
            created_at: Utc::now(),
        };
        inner.chats.push(message.clone());
        Ok(message)
    }

    async fn range_by_conversation(
        &self,
        a: UserId,
        b: UserId,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        let inner = self.inner.read().await;
        let rows: Vec<Message> = inner
            .chats
            .iter()
            .rev()
            .filter(|m| m.is_between(a, b))
            .filter(|m| cursor.map_or(true, |c| m.id <= c))
            .take(limit as usize + 1)
            .cloned()
            .collect();
        Ok(Slice::from_overfetch(rows, limit))
    }

    async fn latest_per_counterpart(
        &self,
        user: UserId,
        search: Option<&str>,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        let needle = search.map(str::to_lowercase);
        let inner = self.inner.read().await;

        // Newest first, so the first hit per counterpart is its latest message
        let mut seen = HashSet::new();
        let rows: Vec<Message> = inner
            .chats
            .iter()
            .rev()
            .filter(|m| m.from_user_id == user || m.to_user_id == user)
            .filter(|m| {
                needle
                    .as_deref()
                    .map_or(true, |n| m.message.to_lowercase().contains(n))
            })
            .filter(|m| seen.insert(m.counterpart_of(user)))
            .filter(|m| cursor.map_or(true, |c| m.id <= c))
            .take(limit as usize + 1)
            .cloned()
            .collect();
        Ok(Slice::from_overfetch(rows, limit))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn profiles(&self, ids: &[UserId]) -> AppResult<HashMap<UserId, UserProfile>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn exists(&self, id: UserId) -> AppResult<bool> {
        Ok(self.inner.read().await.users.contains_key(&id))
    }
}
