//! # Actix Middleware Library
//!
//! Shared middleware components for Nova Actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer-token identity verification
//! - `metrics`: Prometheus metrics middleware

pub mod jwt_auth;
pub mod metrics;

pub use jwt_auth::{bearer_token, AuthenticatedUser, Claims, JwtAuthMiddleware, JwtError, JwtValidator};
pub use metrics::MetricsMiddleware;
