use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use herald_delivery::{FileDescriptor, Message, MessageContent};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::{util::require_bearer, ApiError, AppState};

/// Body of a send. At least one part must be non-empty.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub file: Option<FileDescriptor>,
}

impl From<CreateMessageRequest> for MessageContent {
    fn from(value: CreateMessageRequest) -> Self {
        MessageContent {
            text: value.text,
            image: value.image,
            file: value.file,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[utoipa::path(
    get,
    path = "/api/conversations/{conversation_id}/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("conversation_id" = String, Path, description = "Public conversation id")),
    responses(
        (status = 200, description = "Messages, oldest first", body = MessagesResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessagesResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let messages = state
        .delivery()
        .list_messages(&conversation_id, user.id)
        .await?;

    Ok(Json(MessagesResponse { messages }))
}

/// Sends a message and answers once every recipient has been tried, so the
/// returned ledger already reflects who was reached.
#[utoipa::path(
    post,
    path = "/api/conversations/{conversation_id}/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("conversation_id" = String, Path, description = "Public conversation id")),
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message stored and fanned out", body = MessageResponse),
        (status = 400, description = "Empty or oversized content", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Sender is not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Body does not match the request schema", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal error", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;
    let Json(payload) = payload?;

    let message = state
        .delivery()
        .send(&conversation_id, user.id, payload.into())
        .await?;

    debug!(
        message_id = %message.public_id,
        status = %message.status,
        "send request answered"
    );
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}
