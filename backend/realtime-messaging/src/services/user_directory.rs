use crate::error::AppResult;
use crate::models::{UserId, UserProfile};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;

/// Read-only display data for chat counterparts
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Profiles for the given ids. Unknown ids are absent from the map.
    async fn profiles(&self, ids: &[UserId]) -> AppResult<HashMap<UserId, UserProfile>>;

    async fn exists(&self, id: UserId) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    db: Pool<Postgres>,
}

impl PgUserDirectory {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn profiles(&self, ids: &[UserId]) -> AppResult<HashMap<UserId, UserProfile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, full_name, profile_photo_path FROM users WHERE id = ANY($1)",
        )
        .bind(raw)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn exists(&self, id: UserId) -> AppResult<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(found)
    }
}
