use super::events::{Ack, ClientEvent, RawFrame, ServerEvent};
use super::presence::PresenceRegistry;
use super::{RoomName, RoomRouter};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{ConnectionId, MessageBody, UserId};
use crate::services::pagination::NOT_CONNECTED;
use crate::services::{ConnectionGraph, MessageStore, UserDirectory};
use actix_middleware::AuthenticatedUser;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

pub const SELF_MESSAGE: &str = "You cannot message yourself";
pub const NOT_ALL_CONNECTED: &str = "Not all users are connected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Active,
    Disconnected,
}

/// One live transport connection as seen by the gateway
#[derive(Debug, Clone)]
pub struct ChatConnection {
    pub id: ConnectionId,
    pub user: UserId,
    pub email: String,
    state: ConnectionState,
}

impl ChatConnection {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnectionState::Active
    }
}

/// Drives every live connection: presence, room membership and the four client events.
pub struct MessagingGateway {
    presence: PresenceRegistry,
    rooms: RoomRouter,
    graph: Arc<dyn ConnectionGraph>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
}

impl MessagingGateway {
    pub fn new(
        graph: Arc<dyn ConnectionGraph>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rooms: RoomRouter::new(),
            graph,
            messages,
            users,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomRouter {
        &self.rooms
    }

    /// Bring a verified identity to `Active`. The receiver yields every frame routed
    /// to this connection.
    pub async fn connect(
        &self,
        identity: AuthenticatedUser,
    ) -> (ChatConnection, UnboundedReceiver<String>) {
        let mut conn = ChatConnection {
            id: ConnectionId::new(),
            user: UserId(identity.id),
            email: identity.email,
            state: ConnectionState::Connecting,
        };
        conn.state = ConnectionState::Authenticated;

        // The graph lookup is the only await. Nothing is registered before it, so a
        // dropped future leaves no presence or room state behind.
        let online: Vec<UserId> = self
            .presence
            .online_users()
            .into_iter()
            .filter(|u| *u != conn.user)
            .collect();
        let counterparts = match self.graph.connected_among(conn.user, &online).await {
            Ok(counterparts) => counterparts,
            // The mailbox room already delivers everything; conversation rooms can be
            // joined later through joinChatRooms.
            Err(e) => {
                tracing::warn!(
                    user_id = %conn.user,
                    connection_id = %conn.id,
                    error = %e,
                    "failed to pre-join conversation rooms"
                );
                Default::default()
            }
        };

        let (tx, rx) = unbounded_channel();
        self.presence.on_connect(conn.user, conn.id);
        self.rooms.register(conn.id, tx);
        self.rooms.join(conn.id, RoomName::mailbox(conn.user));
        for other in counterparts {
            self.rooms
                .join(conn.id, RoomName::conversation(conn.user, other));
        }

        conn.state = ConnectionState::Active;
        metrics::connection_opened();
        metrics::set_online_users(self.presence.online_count());
        tracing::info!(user_id = %conn.user, connection_id = %conn.id, "chat connection active");
        (conn, rx)
    }

    /// Tear down a connection. Safe to call more than once.
    pub fn disconnect(&self, conn: &mut ChatConnection) {
        if conn.state == ConnectionState::Disconnected {
            return;
        }
        let was_active = conn.state == ConnectionState::Active;
        conn.state = ConnectionState::Disconnected;

        let went_offline = self.presence.on_disconnect(conn.user, conn.id);
        self.rooms.remove_connection(conn.id);

        if was_active {
            metrics::connection_closed();
        }
        metrics::set_online_users(self.presence.online_count());
        tracing::info!(
            user_id = %conn.user,
            connection_id = %conn.id,
            went_offline,
            "chat connection closed"
        );
    }

    /// Decode one text frame, handle it, and encode the answer (if any)
    pub async fn handle_frame(&self, conn: &ChatConnection, text: &str) -> Option<String> {
        let frame = match RawFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                metrics::record_ws_event("invalid", "rejected");
                return Ack::from_error(&e).to_frame(None);
            }
        };
        let ack = match ClientEvent::parse(&frame.event, frame.data) {
            Ok(event) => self.handle(conn, event).await,
            Err(e) => {
                metrics::record_ws_event("invalid", "rejected");
                tracing::debug!(user_id = %conn.user, event = %frame.event, error = %e, "rejected client frame");
                Ack::from_error(&e)
            }
        };
        ack.to_frame(frame.ack)
    }

    /// Handle a validated event. Never fails: errors become failed acknowledgements.
    pub async fn handle(&self, conn: &ChatConnection, event: ClientEvent) -> Ack {
        let name = event.name();
        let result = if conn.is_active() {
            match event {
                ClientEvent::JoinChatRooms { user_ids } => self.join_chat_rooms(conn, &user_ids).await,
                ClientEvent::SendMessage {
                    to_user_id,
                    message,
                } => self.send_message(conn, to_user_id, &message).await,
                ClientEvent::SendTyping { to_user_id } => {
                    self.typing(conn, to_user_id, ServerEvent::Typing { from_user_id: conn.user })
                        .await
                }
                ClientEvent::StopTyping { to_user_id } => {
                    self.typing(conn, to_user_id, ServerEvent::StopTyping { from_user_id: conn.user })
                        .await
                }
            }
        } else {
            Err(AppError::BadRequest("Connection is not active".into()))
        };

        match result {
            Ok(ack) => {
                metrics::record_ws_event(name, "ok");
                ack
            }
            Err(e) => {
                metrics::record_ws_event(name, if e.is_internal() { "error" } else { "rejected" });
                Ack::from_error(&e)
            }
        }
    }

    async fn ensure_connected(&self, user: UserId, other: UserId) -> AppResult<()> {
        if user == other {
            return Err(AppError::BadRequest(SELF_MESSAGE.into()));
        }
        if !self.graph.exists(user, other).await? {
            return Err(AppError::BadRequest(NOT_CONNECTED.into()));
        }
        Ok(())
    }

    async fn join_chat_rooms(&self, conn: &ChatConnection, user_ids: &[UserId]) -> AppResult<Ack> {
        if !self.graph.exists_all(conn.user, user_ids).await? {
            return Err(AppError::BadRequest(NOT_ALL_CONNECTED.into()));
        }
        for &other in user_ids {
            self.rooms
                .join(conn.id, RoomName::conversation(conn.user, other));
        }
        Ok(Ack::ok("Joined chat rooms"))
    }

    async fn send_message(&self, conn: &ChatConnection, to: UserId, body: &str) -> AppResult<Ack> {
        self.ensure_connected(conn.user, to).await?;

        let message = self.messages.append(conn.user, to, body).await?;
        metrics::message_sent();

        let profiles = self.users.profiles(&[conn.user, to]).await?;
        let (Some(sender), Some(recipient)) = (profiles.get(&conn.user), profiles.get(&to)) else {
            tracing::error!(
                message_id = %message.id,
                from_user_id = %conn.user,
                to_user_id = %to,
                "message persisted but a participant profile is missing"
            );
            return Err(AppError::Internal);
        };

        // Each side sees the other participant as `other_user_*`
        let recipient_view = MessageBody::new(&message, sender);
        let sender_view = MessageBody::new(&message, recipient);

        self.rooms.emit(
            &RoomName::mailbox(to),
            &ServerEvent::NewMessage(recipient_view).to_frame(),
        );
        self.rooms.emit_except(
            &RoomName::mailbox(conn.user),
            conn.id,
            &ServerEvent::NewMessage(sender_view.clone()).to_frame(),
        );

        tracing::debug!(message_id = %message.id, from_user_id = %conn.user, to_user_id = %to, "message delivered");
        Ok(Ack::with_body("Message sent", sender_view))
    }

    async fn typing(&self, conn: &ChatConnection, to: UserId, event: ServerEvent) -> AppResult<Ack> {
        self.ensure_connected(conn.user, to).await?;
        self.rooms.emit(&RoomName::mailbox(to), &event.to_frame());
        Ok(Ack::ok(match event {
            ServerEvent::StopTyping { .. } => "Stop typing sent",
            _ => "Typing sent",
        }))
    }
}
