//! services/api/src/web/chat.rs
//!
//! Chat messages between clients and counselors (`chatMessages`).

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use simricare_core::domain::{chat_room_id, new_document_id, ChatMessage};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{created, ok, optional, required, JsonBody, QueryParams};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub message: Option<String>,
    /// Derived from the two participant ids when absent.
    pub room_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    pub room_id: Option<String>,
    pub user_id: Option<String>,
}

/// POST /api/chat - Send a message
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored"),
        (status = 400, description = "Missing senderId, receiverId or message"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> RouteResult<impl IntoResponse> {
    let sender_id = required(req.sender_id, "senderId")?;
    let receiver_id = required(req.receiver_id, "receiverId")?;
    let message = required(req.message, "message")?;

    let message = ChatMessage {
        id: new_document_id(),
        room_id: optional(req.room_id).unwrap_or_else(|| chat_room_id(&sender_id, &receiver_id)),
        sender_id,
        receiver_id,
        message,
        read: false,
        timestamp: state.clock.now(),
    };

    let saved = state
        .chat
        .save_message(message)
        .await
        .map_err(|e| RouteError::from_port(e, "메시지를 전송하지 못했습니다."))?;
    Ok(created(saved))
}

/// GET /api/chat - Messages of a room, or every message of a user
#[utoipa::path(
    get,
    path = "/api/chat",
    params(
        ("roomId" = Option<String>, Query, description = "Chat room id"),
        ("userId" = Option<String>, Query, description = "Sender or receiver id, used when roomId is absent")
    ),
    responses(
        (status = 200, description = "Messages, oldest first"),
        (status = 400, description = "Neither roomId nor userId given")
    )
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ChatQuery>,
) -> RouteResult<impl IntoResponse> {
    let messages = match (optional(query.room_id), optional(query.user_id)) {
        (Some(room_id), _) => state.chat.messages_in_room(&room_id).await,
        (None, Some(user_id)) => state.chat.messages_for_user(&user_id).await,
        (None, None) => {
            return Err(RouteError::validation("roomId 또는 userId가 필요합니다."));
        }
    }
    .map_err(|e| RouteError::from_port(e, "메시지를 불러오지 못했습니다."))?;
    Ok(ok(messages))
}

/// PUT /api/chat/{id}/read - Mark a message as read
#[utoipa::path(
    put,
    path = "/api/chat/{id}/read",
    params(("id" = String, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message marked as read"),
        (status = 400, description = "Unknown message")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RouteResult<impl IntoResponse> {
    let message = state
        .chat
        .mark_read(&id)
        .await
        .map_err(|e| RouteError::from_port(e, "메시지를 갱신하지 못했습니다."))?;
    Ok(ok(message))
}
