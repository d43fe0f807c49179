use super::{ConnectionGraph, MessageStore, UserDirectory};
use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{Message, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub const NOT_CONNECTED: &str = "You are not connected with this user";

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub cursor: Option<MessageId>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<MessageId>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub other_user_id: UserId,
    pub other_user_username: String,
    pub other_user_full_name: String,
    pub other_user_profile_photo_path: Option<String>,
    pub latest_message_id: MessageId,
    pub latest_message_timestamp: DateTime<Utc>,
    pub latest_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub chat_id: MessageId,
    pub from_user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl From<Message> for HistoryEntry {
    fn from(m: Message) -> Self {
        Self {
            chat_id: m.id,
            from_user_id: m.from_user_id,
            timestamp: m.created_at,
            message: m.message,
        }
    }
}

/// Raw `?cursor&limit` parameters. Kept as strings so malformed values surface as
/// field errors in the service's own envelope.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct InboxQuery {
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

/// Validated page position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<MessageId>,
    pub limit: u32,
}

impl PageRequest {
    pub fn parse(
        cursor: Option<&str>,
        limit: Option<&str>,
        config: &PaginationConfig,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::default();

        let cursor = match cursor.map(str::trim).filter(|c| !c.is_empty()) {
            None => None,
            Some(raw) => match raw.parse::<MessageId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("cursor", "must be a decimal id string");
                    None
                }
            },
        };

        let limit = match limit.map(str::trim).filter(|l| !l.is_empty()) {
            None => config.default_limit,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if (1..=config.max_limit).contains(&n) => n,
                _ => {
                    errors.add(
                        "limit",
                        format!("must be between 1 and {}", config.max_limit),
                    );
                    config.default_limit
                }
            },
        };

        errors.into_result()?;
        Ok(Self { cursor, limit })
    }
}

/// Cursor-paginated read views over the chat log
pub struct PaginationService {
    graph: Arc<dyn ConnectionGraph>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    config: PaginationConfig,
}

impl PaginationService {
    pub fn new(
        graph: Arc<dyn ConnectionGraph>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        config: PaginationConfig,
    ) -> Self {
        Self {
            graph,
            messages,
            users,
            config,
        }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Latest message per counterpart, hiding counterparts no longer connected.
    ///
    /// The connection filter runs after grouping and after the page is cut, so a page
    /// may hold fewer than `limit` entries while `nextCursor` is still set.
    pub async fn inbox(
        &self,
        user: UserId,
        search: Option<&str>,
        page: PageRequest,
    ) -> AppResult<Page<InboxEntry>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let slice = self
            .messages
            .latest_per_counterpart(user, search, page.cursor, page.limit)
            .await?;

        let counterparts: Vec<UserId> = slice
            .items
            .iter()
            .map(|m| m.counterpart_of(user))
            .collect();
        let connected = self.graph.connected_among(user, &counterparts).await?;
        let profiles = self.users.profiles(&counterparts).await?;

        let mut data = Vec::with_capacity(slice.items.len());
        for message in slice.items {
            let other = message.counterpart_of(user);
            if !connected.contains(&other) {
                continue;
            }
            let Some(profile) = profiles.get(&other) else {
                tracing::warn!(user_id = %user, other_user_id = %other, "inbox counterpart has no profile, skipping");
                continue;
            };
            data.push(InboxEntry {
                other_user_id: other,
                other_user_username: profile.username.clone(),
                other_user_full_name: profile.full_name.clone(),
                other_user_profile_photo_path: profile.profile_photo_path.clone(),
                latest_message_id: message.id,
                latest_message_timestamp: message.created_at,
                latest_message: message.message,
            });
        }

        Ok(Page {
            data,
            meta: PageMeta {
                cursor: page.cursor,
                next_cursor: slice.next_cursor,
                limit: page.limit,
            },
        })
    }

    /// Messages between `user` and `other`, newest first.
    ///
    /// Gated on an active connection like live messaging, so after an unconnect the
    /// old messages are unreachable until the users reconnect. Whether history should
    /// stay readable without a connection is still an open product question.
    pub async fn history(
        &self,
        user: UserId,
        other: UserId,
        page: PageRequest,
    ) -> AppResult<Page<HistoryEntry>> {
        if !self.users.exists(other).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        if !self.graph.exists(user, other).await? {
            return Err(AppError::BadRequest(NOT_CONNECTED.into()));
        }

        let slice = self
            .messages
            .range_by_conversation(user, other, page.cursor, page.limit)
            .await?;
        let next_cursor = slice.next_cursor;

        Ok(Page {
            data: slice.map(HistoryEntry::from).items,
            meta: PageMeta {
                cursor: page.cursor,
                next_cursor,
                limit: page.limit,
            },
        })
    }
}
