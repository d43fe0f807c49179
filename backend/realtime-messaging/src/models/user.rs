use serde::Serialize;

use super::UserId;

/// Display data for a chat counterpart, read from `users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub profile_photo_path: Option<String>,
}
