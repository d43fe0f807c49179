use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, UserId, UserProfile};

/// Message row matching the `chats` table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other participant of this message, seen from `user`
    pub fn counterpart_of(&self, user: UserId) -> UserId {
        if self.from_user_id == user {
            self.to_user_id
        } else {
            self.from_user_id
        }
    }

    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.from_user_id == a && self.to_user_id == b)
            || (self.from_user_id == b && self.to_user_id == a)
    }
}

/// Message as rendered for one participant: `other_user_*` always describes the
/// counterpart of whoever receives the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub other_user_id: UserId,
    pub other_user_username: String,
    pub other_user_full_name: String,
    pub other_user_profile_photo_path: Option<String>,
    pub from_user_id: UserId,
    pub message_id: MessageId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageBody {
    pub fn new(message: &Message, other: &UserProfile) -> Self {
        Self {
            other_user_id: other.id,
            other_user_username: other.username.clone(),
            other_user_full_name: other.full_name.clone(),
            other_user_profile_photo_path: other.profile_photo_path.clone(),
            from_user_id: message.from_user_id,
            message_id: message.id,
            message: message.message.clone(),
            timestamp: message.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(from: i64, to: i64) -> Message {
        Message {
            id: MessageId(1),
            from_user_id: UserId(from),
            to_user_id: UserId(to),
            message: "hi".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counterpart_is_direction_independent() {
        let m = msg(1, 2);
        assert_eq!(m.counterpart_of(UserId(1)), UserId(2));
        assert_eq!(m.counterpart_of(UserId(2)), UserId(1));
        assert!(m.is_between(UserId(2), UserId(1)));
        assert!(!m.is_between(UserId(1), UserId(3)));
    }

    #[test]
    fn body_serializes_ids_as_strings() {
        let m = msg(1, 2);
        let other = UserProfile {
            id: UserId(2),
            username: "bob".into(),
            full_name: "Bob B".into(),
            profile_photo_path: None,
        };
        let v = serde_json::to_value(MessageBody::new(&m, &other)).unwrap();
        assert_eq!(v["other_user_id"], "2");
        assert_eq!(v["from_user_id"], "1");
        assert_eq!(v["message_id"], "1");
        assert_eq!(v["other_user_username"], "bob");
        assert!(v["other_user_profile_photo_path"].is_null());
    }
}
