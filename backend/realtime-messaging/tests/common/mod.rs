#![allow(dead_code)]

use actix_middleware::{AuthenticatedUser, Claims, JwtValidator};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use realtime_messaging::config::{PaginationConfig, WsConfig};
use realtime_messaging::models::{UserId, UserProfile};
use realtime_messaging::services::MemoryStore;
use realtime_messaging::state::AppState;
use std::sync::Arc;

pub const SECRET: &[u8] = b"integration-secret";

pub async fn store_with_users(ids: &[i64]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for &id in ids {
        store
            .add_user(UserProfile {
                id: UserId(id),
                username: format!("user{id}"),
                full_name: format!("User {id}"),
                profile_photo_path: (id % 2 == 0).then(|| format!("/photos/{id}.jpg")),
            })
            .await;
    }
    store
}

pub fn app_state(store: &Arc<MemoryStore>) -> AppState {
    AppState::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(JwtValidator::from_secret(SECRET)),
        PaginationConfig::default(),
        WsConfig::default(),
    )
}

pub fn identity(id: i64) -> AuthenticatedUser {
    AuthenticatedUser {
        id,
        email: format!("user{id}@example.com"),
    }
}

pub fn token(id: i64) -> String {
    let claims = Claims {
        sub: id.to_string(),
        // 2100-01-01
        exp: 4_102_444_800,
        email: format!("user{id}@example.com"),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

/// Parse a pushed frame
pub fn frame(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap()
}
