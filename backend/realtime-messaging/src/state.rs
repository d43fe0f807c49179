use crate::config::{PaginationConfig, WsConfig};
use crate::services::{ConnectionGraph, MessageStore, PaginationService, UserDirectory};
use crate::websocket::MessagingGateway;
use actix_middleware::JwtValidator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<MessagingGateway>,
    pub pagination: Arc<PaginationService>,
    pub jwt: Arc<JwtValidator>,
    pub ws: WsConfig,
}

impl AppState {
    /// Wire both the live gateway and the read views to the same storage ports
    pub fn new(
        graph: Arc<dyn ConnectionGraph>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        jwt: Arc<JwtValidator>,
        pagination: PaginationConfig,
        ws: WsConfig,
    ) -> Self {
        let gateway = Arc::new(MessagingGateway::new(
            graph.clone(),
            messages.clone(),
            users.clone(),
        ));
        let pagination = Arc::new(PaginationService::new(graph, messages, users, pagination));
        Self {
            gateway,
            pagination,
            jwt,
            ws,
        }
    }
}
