//! Wire frames for the `/ws/chat` endpoint.
//!
//! Client frames look like `{"event": "...", "ack": 7, "data": {...}}`. They are read
//! in two steps: the envelope first, then the payload for the named event, so a bad
//! payload can still be answered on the right ack id.

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{MessageBody, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use validator::Validate;

const INTERNAL_ERROR_FRAME: &str =
    r#"{"event":"error","data":{"success":false,"message":"internal error"}}"#;

#[derive(Debug, Deserialize)]
pub struct RawFrame {
    pub event: String,
    #[serde(default)]
    pub ack: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

impl RawFrame {
    pub fn parse(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::Validation(FieldErrors::single("frame", e.to_string())))
    }
}

#[derive(Debug, Deserialize, Validate)]
struct JoinChatRoomsPayload {
    #[validate(length(min = 1, max = 100, message = "must contain between 1 and 100 ids"))]
    user_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct SendMessagePayload {
    to_user_id: String,
    #[validate(length(min = 1, max = 5000, message = "must be between 1 and 5000 characters"))]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TypingPayload {
    to_user_id: String,
}

/// A validated client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinChatRooms { user_ids: Vec<UserId> },
    SendMessage { to_user_id: UserId, message: String },
    SendTyping { to_user_id: UserId },
    StopTyping { to_user_id: UserId },
}

fn payload<T: for<'de> Deserialize<'de>>(data: Value) -> AppResult<T> {
    serde_json::from_value(data)
        .map_err(|e| AppError::Validation(FieldErrors::single("data", e.to_string())))
}

fn parse_id(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<UserId> {
    match raw.parse::<UserId>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, format!("invalid id {raw:?}: expected a decimal string"));
            None
        }
    }
}

impl ClientEvent {
    pub fn parse(event: &str, data: Value) -> AppResult<Self> {
        match event {
            "joinChatRooms" => {
                let p: JoinChatRoomsPayload = payload(data)?;
                p.validate()?;
                let mut errors = FieldErrors::default();
                let ids: BTreeSet<UserId> = p
                    .user_ids
                    .iter()
                    .filter_map(|raw| parse_id("user_ids", raw, &mut errors))
                    .collect();
                errors.into_result()?;
                Ok(ClientEvent::JoinChatRooms {
                    user_ids: ids.into_iter().collect(),
                })
            }
            "sendMessage" => {
                let p: SendMessagePayload = payload(data)?;
                let mut errors = match p.validate() {
                    Ok(()) => FieldErrors::default(),
                    Err(e) => e.into(),
                };
                if !p.message.is_empty() && p.message.trim().is_empty() {
                    errors.add("message", "must not be blank");
                }
                let to = parse_id("to_user_id", &p.to_user_id, &mut errors);
                errors.into_result()?;
                Ok(ClientEvent::SendMessage {
                    to_user_id: to.ok_or(AppError::Internal)?,
                    message: p.message,
                })
            }
            "sendTyping" | "stopTyping" => {
                let p: TypingPayload = payload(data)?;
                let mut errors = FieldErrors::default();
                let to = parse_id("to_user_id", &p.to_user_id, &mut errors);
                errors.into_result()?;
                let to_user_id = to.ok_or(AppError::Internal)?;
                Ok(if event == "sendTyping" {
                    ClientEvent::SendTyping { to_user_id }
                } else {
                    ClientEvent::StopTyping { to_user_id }
                })
            }
            other => Err(AppError::Validation(FieldErrors::single(
                "event",
                format!("unknown event {other:?}"),
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChatRooms { .. } => "joinChatRooms",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::SendTyping { .. } => "sendTyping",
            ClientEvent::StopTyping { .. } => "stopTyping",
        }
    }
}

/// Acknowledgement payload answering one client event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<MessageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            body: None,
            errors: None,
        }
    }

    pub fn with_body(message: impl Into<String>, body: MessageBody) -> Self {
        Self {
            body: Some(body),
            ..Self::ok(message)
        }
    }

    /// Internal failures are logged in full here and reach the client only as
    /// "internal error".
    pub fn from_error(err: &AppError) -> Self {
        if err.is_internal() {
            tracing::error!(error = %err, "chat event failed");
        }
        Self {
            success: false,
            message: err.public_message(),
            body: None,
            errors: err.field_errors().cloned(),
        }
    }

    /// Encode for the wire. Without an ack id only failures are reported, as an
    /// `error` event; a successful un-acked event needs no answer.
    pub fn to_frame(&self, ack: Option<u64>) -> Option<String> {
        match ack {
            Some(id) => Some(encode(&OutboundFrame {
                event: "ack",
                ack: Some(id),
                data: self,
            })),
            None if !self.success => Some(encode(&OutboundFrame {
                event: "error",
                ack: None,
                data: self,
            })),
            None => None,
        }
    }
}

/// Server-initiated pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    NewMessage(MessageBody),
    Typing { from_user_id: UserId },
    StopTyping { from_user_id: UserId },
}

#[derive(Serialize)]
struct TypingData {
    from_user_id: UserId,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::StopTyping { .. } => "stopTyping",
        }
    }

    pub fn to_frame(&self) -> String {
        match self {
            ServerEvent::NewMessage(body) => encode(&OutboundFrame {
                event: self.name(),
                ack: None,
                data: body,
            }),
            ServerEvent::Typing { from_user_id } | ServerEvent::StopTyping { from_user_id } => {
                encode(&OutboundFrame {
                    event: self.name(),
                    ack: None,
                    data: &TypingData {
                        from_user_id: *from_user_id,
                    },
                })
            }
        }
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a, T: Serialize> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack: Option<u64>,
    data: &'a T,
}

fn encode<T: Serialize>(frame: &OutboundFrame<'_, T>) -> String {
    serde_json::to_string(frame).unwrap_or_else(|e| {
        tracing::error!(error = %e, event = frame.event, "failed to encode frame");
        INTERNAL_ERROR_FRAME.to_string()
    })
}
