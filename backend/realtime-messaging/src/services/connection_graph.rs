use crate::error::{AppError, AppResult};
use crate::models::UserId;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::collections::HashSet;

/// Read side of the social graph: who may message whom.
///
/// Implementations read through to storage on every call. A removed edge must be
/// visible to the very next authorization check.
#[async_trait]
pub trait ConnectionGraph: Send + Sync {
    /// True iff `a` and `b` are connected. Symmetric.
    async fn exists(&self, a: UserId, b: UserId) -> AppResult<bool>;

    /// True iff `user` is connected to every id in `others`.
    /// An empty set is trivially satisfied.
    async fn exists_all(&self, user: UserId, others: &[UserId]) -> AppResult<bool>;

    /// The subset of `candidates` connected to `user`
    async fn connected_among(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> AppResult<HashSet<UserId>>;
}

fn raw_ids(ids: &[UserId]) -> Vec<i64> {
    ids.iter().map(|id| id.0).collect()
}

#[derive(Clone)]
pub struct PgConnectionGraph {
    db: Pool<Postgres>,
}

impl PgConnectionGraph {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    /// Create the edge as two directed rows in one transaction
    pub async fn link(&self, a: UserId, b: UserId) -> AppResult<()> {
        if a == b {
            return Err(AppError::BadRequest("cannot connect a user to themselves".into()));
        }
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO connections (user_id, other_user_id) VALUES ($1, $2), ($2, $1) \
             ON CONFLICT DO NOTHING",
        )
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove both directed rows. Chat history is left untouched.
    pub async fn unlink(&self, a: UserId, b: UserId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "DELETE FROM connections \
             WHERE (user_id = $1 AND other_user_id = $2) OR (user_id = $2 AND other_user_id = $1)",
        )
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionGraph for PgConnectionGraph {
    async fn exists(&self, a: UserId, b: UserId) -> AppResult<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM connections \
             WHERE (user_id = $1 AND other_user_id = $2) OR (user_id = $2 AND other_user_id = $1))",
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;
        Ok(found)
    }

    async fn exists_all(&self, user: UserId, others: &[UserId]) -> AppResult<bool> {
        let wanted: HashSet<UserId> = others.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(true);
        }
        if wanted.contains(&user) {
            return Ok(false);
        }
        let unique: Vec<UserId> = wanted.into_iter().collect();
        let connected = self.connected_among(user, &unique).await?;
        Ok(connected.len() == unique.len())
    }

    async fn connected_among(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> AppResult<HashSet<UserId>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT other_user_id FROM connections WHERE user_id = $1 AND other_user_id = ANY($2) \
             UNION \
             SELECT user_id FROM connections WHERE other_user_id = $1 AND user_id = ANY($2)",
        )
        .bind(user)
        .bind(raw_ids(candidates))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(UserId).collect())
    }
}
