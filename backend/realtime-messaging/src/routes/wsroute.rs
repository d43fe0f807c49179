use crate::error::AppError;
use crate::state::AppState;
use crate::websocket::session::ChatSession;
use actix_middleware::bearer_token;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Browsers cannot set headers on a WebSocket handshake
    pub token: Option<String>,
}

#[get("/ws/chat")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let token = bearer_token(req.headers().get(AUTHORIZATION))
        .map(str::to_string)
        .or_else(|| query.into_inner().token.filter(|t| !t.is_empty()));

    let Some(token) = token else {
        tracing::warn!("WebSocket connection rejected: no token provided");
        return Err(AppError::Unauthorized.into());
    };

    let identity = state.jwt.verify(&token).map_err(|e| {
        tracing::warn!(error = %e, "WebSocket connection rejected: invalid token");
        AppError::Unauthorized
    })?;

    ws::start(
        ChatSession::new(state.gateway.clone(), identity, state.ws),
        &req,
        stream,
    )
}
