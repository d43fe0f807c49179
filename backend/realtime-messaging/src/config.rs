use crate::error::AppError;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// How bearer tokens are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtKey {
    /// RS256 public key issued by the identity service
    RsaPublicPem(String),
    /// HS256 shared secret, development only
    Secret(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 15,
            max_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub jwt_key: JwtKey,
    pub ws: WsConfig,
    pub pagination: PaginationConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage = match get("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "STORAGE_BACKEND must be `postgres` or `memory`, got `{other}`"
                )))
            }
        };

        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }

        let jwt_key = match (get("JWT_PUBLIC_KEY_PEM"), get("JWT_SECRET")) {
            (Some(pem), None) => JwtKey::RsaPublicPem(pem.replace("\\n", "\n")),
            (None, Some(secret)) => JwtKey::Secret(secret),
            (Some(_), Some(_)) => {
                return Err(AppError::Config(
                    "set only one of JWT_PUBLIC_KEY_PEM and JWT_SECRET".into(),
                ))
            }
            (None, None) => {
                return Err(AppError::Config(
                    "JWT_PUBLIC_KEY_PEM or JWT_SECRET must be set".into(),
                ))
            }
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT must be `text` or `json`, got `{other}`"
                )))
            }
        };

        let ws = WsConfig {
            heartbeat_interval: Duration::from_secs(parse_or(&get, "WS_HEARTBEAT_INTERVAL_SECS", 5)?),
            client_timeout: Duration::from_secs(parse_or(&get, "WS_CLIENT_TIMEOUT_SECS", 30)?),
        };
        if ws.client_timeout <= ws.heartbeat_interval {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }

        let pagination = PaginationConfig {
            default_limit: parse_or(&get, "PAGINATION_DEFAULT_LIMIT", 15)?,
            max_limit: parse_or(&get, "PAGINATION_MAX_LIMIT", 50)?,
        };
        if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
            return Err(AppError::Config(
                "PAGINATION_DEFAULT_LIMIT must be between 1 and PAGINATION_MAX_LIMIT".into(),
            ));
        }

        Ok(Config {
            storage,
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(&get, "PORT", 3000)?,
            jwt_key,
            ws,
            pagination,
            log_format,
        })
    }

    /// Convenience for tests and local runs
    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, AppError> {
        Self::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value `{raw}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/chat"),
            ("JWT_SECRET", "dev-secret"),
        ])
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_map(&base()).unwrap();
        assert_eq!(cfg.storage, StorageBackend::Postgres);
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.pagination, PaginationConfig::default());
        assert_eq!(cfg.ws, WsConfig::default());
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.jwt_key, JwtKey::Secret("dev-secret".into()));
    }

    #[test]
    fn postgres_requires_database_url() {
        let mut vars = base();
        vars.remove("DATABASE_URL");
        assert!(matches!(Config::from_map(&vars), Err(AppError::Config(_))));

        vars.insert("STORAGE_BACKEND", "memory");
        let cfg = Config::from_map(&vars).unwrap();
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn exactly_one_jwt_key() {
        let mut vars = base();
        vars.insert("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----");
        assert!(Config::from_map(&vars).is_err());

        vars.remove("JWT_SECRET");
        vars.remove("JWT_PUBLIC_KEY_PEM");
        assert!(Config::from_map(&vars).is_err());
    }

    #[test]
    fn pem_newlines_are_unescaped() {
        let mut vars = base();
        vars.remove("JWT_SECRET");
        vars.insert("JWT_PUBLIC_KEY_PEM", "line1\\nline2");
        let cfg = Config::from_map(&vars).unwrap();
        assert_eq!(cfg.jwt_key, JwtKey::RsaPublicPem("line1\nline2".into()));
    }

    #[test]
    fn rejects_bad_numbers_and_limits() {
        let mut vars = base();
        vars.insert("PORT", "eighty");
        assert!(Config::from_map(&vars).is_err());

        let mut vars = base();
        vars.insert("PAGINATION_DEFAULT_LIMIT", "60");
        assert!(Config::from_map(&vars).is_err());

        let mut vars = base();
        vars.insert("WS_CLIENT_TIMEOUT_SECS", "2");
        assert!(Config::from_map(&vars).is_err());
    }

    #[test]
    fn rejects_unknown_backend() {
        let mut vars = base();
        vars.insert("STORAGE_BACKEND", "redis");
        assert!(Config::from_map(&vars).is_err());
    }
}
