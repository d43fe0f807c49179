use actix_middleware::{JwtValidator, MetricsMiddleware};
use actix_web::{web, App, HttpServer};
use realtime_messaging::{
    config::{self, JwtKey, StorageBackend},
    db, error, logging, routes,
    services::{MemoryStore, PgConnectionGraph, PgMessageStore, PgUserDirectory},
    state::AppState,
};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    let cfg = config::Config::from_env()?;
    logging::init_tracing(cfg.log_format);

    let jwt = Arc::new(match &cfg.jwt_key {
        JwtKey::RsaPublicPem(pem) => JwtValidator::from_rsa_pem(pem)
            .map_err(|e| error::AppError::StartServer(format!("jwt: {e}")))?,
        JwtKey::Secret(secret) => {
            tracing::warn!("verifying tokens with a shared HS256 secret; use only in development");
            JwtValidator::from_secret(secret.as_bytes())
        }
    });

    let state = match cfg.storage {
        StorageBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| error::AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(url, cfg.database_max_connections)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            AppState::new(
                Arc::new(PgConnectionGraph::new(pool.clone())),
                Arc::new(PgMessageStore::new(pool.clone())),
                Arc::new(PgUserDirectory::new(pool)),
                jwt,
                cfg.pagination,
                cfg.ws,
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; all data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            AppState::new(store.clone(), store.clone(), store, jwt, cfg.pagination, cfg.ws)
        }
    };

    let bind_addr = ("0.0.0.0", cfg.port);
    tracing::info!(port = cfg.port, "starting realtime-messaging");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure(&state))
    })
    .bind(bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
