pub mod message;
pub mod user;

pub use message::{Message, MessageBody};
pub use user::UserProfile;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use uuid::Uuid;

/// Integer identifiers exceed the safe-integer range of JavaScript clients, so they
/// always cross the wire as decimal strings.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse()
                    .map_err(|_| de::Error::custom(format!("invalid id {raw:?}: expected a decimal string")))
            }
        }
    };
}

string_id!(
    /// Opaque user identity assigned by the identity service
    UserId
);

string_id!(
    /// Store-assigned, strictly increasing message identifier
    MessageId
);

/// Identifies a single live transport connection (one tab or device)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_strings() {
        let id = UserId(9_007_199_254_740_993);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"9007199254740993\""
        );
    }

    #[test]
    fn ids_deserialize_from_strings_only() {
        let id: MessageId = serde_json::from_str("\"501\"").unwrap();
        assert_eq!(id, MessageId(501));

        assert!(serde_json::from_str::<MessageId>("501").is_err());
        assert!(serde_json::from_str::<MessageId>("\"abc\"").is_err());
    }

    #[test]
    fn user_ids_order_numerically() {
        assert!(UserId(9) < UserId(10));
        assert_eq!("42".parse::<UserId>().unwrap(), UserId(42));
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
