use super::gateway::{ChatConnection, MessagingGateway};
use crate::config::WsConfig;
use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler, WrapFuture,
};
use actix_middleware::AuthenticatedUser;
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// WebSocket actor for one `/ws/chat` connection.
///
/// Client frames are handled with `ctx.wait`, so events from one connection are
/// processed strictly in the order received.
pub struct ChatSession {
    gateway: Arc<MessagingGateway>,
    identity: Option<AuthenticatedUser>,
    conn: Option<ChatConnection>,
    hb: Instant,
    ws: WsConfig,
}

impl ChatSession {
    pub fn new(gateway: Arc<MessagingGateway>, identity: AuthenticatedUser, ws: WsConfig) -> Self {
        Self {
            gateway,
            identity: Some(identity),
            conn: None,
            hb: Instant::now(),
            ws,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.ws.client_timeout;
        ctx.run_interval(self.ws.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(
                    user_id = ?act.conn.as_ref().map(|c| c.user),
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&mut self, text: String, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(conn) = self.conn.clone() else {
            tracing::debug!("frame received before connection became active");
            return;
        };
        let gateway = self.gateway.clone();
        let fut = async move { gateway.handle_frame(&conn, &text).await };
        ctx.wait(fut.into_actor(self).map(|reply, _act, ctx| {
            if let Some(frame) = reply {
                ctx.text(frame);
            }
        }));
    }
}

impl Actor for ChatSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let Some(identity) = self.identity.take() else {
            ctx.stop();
            return;
        };
        let gateway = self.gateway.clone();
        let fut = async move { gateway.connect(identity).await };
        ctx.wait(fut.into_actor(self).map(|(conn, rx), act, ctx| {
            act.conn = Some(conn);
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(conn) = self.conn.as_mut() {
            self.gateway.disconnect(conn);
        }
    }
}

// Frames routed to this connection by the room router
impl StreamHandler<String> for ChatSession {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("outbound channel closed");
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(text.to_string(), ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(?reason, "WebSocket close message received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
