use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{Message, MessageId, UserId};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

/// One page of a descending id scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    pub items: Vec<T>,
    /// Id of the first row of the next page, `None` on the last page
    pub next_cursor: Option<MessageId>,
}

impl<T> Slice<T> {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

impl Slice<Message> {
    /// Build a page from a `limit + 1` over-fetch. The probe row is dropped and its id
    /// becomes the cursor, so the next `id <= cursor` scan resumes exactly there.
    pub fn from_overfetch(mut rows: Vec<Message>, limit: u32) -> Self {
        let limit = limit as usize;
        let next_cursor = rows.get(limit).map(|probe| probe.id);
        rows.truncate(limit);
        Slice {
            items: rows,
            next_cursor,
        }
    }
}

/// Append-only chat log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message. Ids are strictly increasing and never reused.
    async fn append(&self, from: UserId, to: UserId, body: &str) -> AppResult<Message>;

    /// Messages between `a` and `b`, newest first, at or below `cursor`
    async fn range_by_conversation(
        &self,
        a: UserId,
        b: UserId,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>>;

    /// Most recent message of every conversation `user` takes part in, newest first.
    ///
    /// `search` filters message bodies before grouping; `cursor` is applied to the
    /// grouped result.
    async fn latest_per_counterpart(
        &self,
        user: UserId,
        search: Option<&str>,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>>;
}

pub(crate) fn reject_self_message(from: UserId, to: UserId) -> AppResult<()> {
    if from == to {
        return Err(AppError::Validation(FieldErrors::single(
            "to_user_id",
            "sender and recipient must differ",
        )));
    }
    Ok(())
}

/// Escape LIKE metacharacters so the search text matches literally
pub fn escape_like(search: &str) -> String {
    let mut out = String::with_capacity(search.len() + 2);
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct PgMessageStore {
    db: Pool<Postgres>,
}

impl PgMessageStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, from: UserId, to: UserId, body: &str) -> AppResult<Message> {
        reject_self_message(from, to)?;
        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO chats (from_user_id, to_user_id, message) VALUES ($1, $2, $3) \
             RETURNING id, from_user_id, to_user_id, message, created_at",
        )
        .bind(from)
        .bind(to)
        .bind(body)
        .fetch_one(&self.db)
        .await?;
        Ok(message)
    }

    async fn range_by_conversation(
        &self,
        a: UserId,
        b: UserId,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, from_user_id, to_user_id, message, created_at
            FROM chats
            WHERE ((from_user_id = $1 AND to_user_id = $2) OR (from_user_id = $2 AND to_user_id = $1))
              AND ($3::BIGINT IS NULL OR id <= $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(cursor)
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.db)
        .await?;
        Ok(Slice::from_overfetch(rows, limit))
    }

    async fn latest_per_counterpart(
        &self,
        user: UserId,
        search: Option<&str>,
        cursor: Option<MessageId>,
        limit: u32,
    ) -> AppResult<Slice<Message>> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));
        // DISTINCT ON keeps the max-id row per counterpart; the cursor and limit only
        // apply to the grouped rows.
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, from_user_id, to_user_id, message, created_at
            FROM (
                SELECT DISTINCT ON (CASE WHEN from_user_id = $1 THEN to_user_id ELSE from_user_id END)
                       id, from_user_id, to_user_id, message, created_at
                FROM chats
                WHERE (from_user_id = $1 OR to_user_id = $1)
                  AND ($2::TEXT IS NULL OR message ILIKE $2)
                ORDER BY CASE WHEN from_user_id = $1 THEN to_user_id ELSE from_user_id END, id DESC
            ) latest
            WHERE ($3::BIGINT IS NULL OR id <= $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
        )
        .bind(user)
        .bind(pattern)
        .bind(cursor)
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.db)
        .await?;
        Ok(Slice::from_overfetch(rows, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rows(ids: &[i64]) -> Vec<Message> {
        ids.iter()
            .map(|&id| Message {
                id: MessageId(id),
                from_user_id: UserId(1),
                to_user_id: UserId(2),
                message: format!("m{id}"),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn overfetch_probe_becomes_cursor() {
        let page = Slice::from_overfetch(rows(&[9, 8, 7]), 2);
        let ids: Vec<i64> = page.items.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![9, 8]);
        assert_eq!(page.next_cursor, Some(MessageId(7)));
        assert!(page.has_more());
    }

    #[test]
    fn short_page_has_no_cursor() {
        let page = Slice::from_overfetch(rows(&[9, 8]), 2);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, None);

        let empty = Slice::from_overfetch(Vec::new(), 15);
        assert!(empty.items.is_empty());
        assert!(!empty.has_more());
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn self_message_is_a_validation_error() {
        let err = reject_self_message(UserId(3), UserId(3)).unwrap_err();
        assert!(err.field_errors().unwrap().get("to_user_id").is_some());
        assert!(reject_self_message(UserId(3), UserId(4)).is_ok());
    }
}
