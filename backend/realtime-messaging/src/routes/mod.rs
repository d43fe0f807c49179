pub mod chats;
pub mod wsroute;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use actix_middleware::JwtAuthMiddleware;
use actix_web::{web, HttpResponse};

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Mount every route. The chat API sits behind bearer auth; the WebSocket handshake
/// verifies its own token so it can also accept `?token=`.
pub fn configure(state: &AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    let jwt = state.jwt.clone();
    move |cfg: &mut web::ServiceConfig| {
        cfg.route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics_handler))
            .service(wsroute::ws_handler)
            .service(
                web::scope("/api/v1/chats")
                    .wrap(JwtAuthMiddleware::new(jwt))
                    .route("/inbox", web::get().to(chats::inbox))
                    .route("/history/{other_user_id}", web::get().to(chats::history)),
            );
    }
}
