use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use herald_auth::User;
use herald_delivery::ServerEvent;
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::IntoParams;

use crate::{ApiError, AppState};

const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Deserialize, IntoParams)]
pub struct WebSocketQuery {
    /// Session token, same as the bearer token of the HTTP API
    token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "WebSocket",
    params(WebSocketQuery),
    responses(
        (status = 101, description = "Upgraded; pushes `hello` then `new_message` events"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    let (user, _) = state.authenticate(&token).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let (handle, mut events) = state
        .registry()
        .register(user.id, state.outbound_buffer())
        .await;
    let connection_id = handle.connection_id;
    info!(user = %user.public_id, connection_id, "websocket connected");

    let (mut ws_sender, mut receiver) = socket.split();

    let hello = ServerEvent::Hello {
        version: PROTOCOL_VERSION.to_string(),
        user_id: user.public_id.clone(),
        connection_id,
    };
    let sender_task = tokio::spawn(async move {
        if let Err(error) = send_event(&mut ws_sender, &hello).await {
            warn!(connection_id, %error, "failed to send hello");
            return;
        }
        while let Some(event) = events.recv().await {
            if let Err(error) = send_event(&mut ws_sender, &event).await {
                warn!(connection_id, event = event.name(), %error, "websocket write failed");
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(WsMessage::Text(_)) => {
                debug!(connection_id, "client frame ignored");
                if let Err(error) = handle.try_send(ServerEvent::Error {
                    message: "messages are sent over HTTP".to_string(),
                }) {
                    debug!(connection_id, %error, "error event dropped");
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Err(error) => {
                debug!(connection_id, %error, "websocket read failed");
                break;
            }
            _ => {}
        }
    }

    sender_task.abort();
    state.registry().unregister(user.id, connection_id).await;
    info!(user = %user.public_id, connection_id, "websocket disconnected");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, WsMessage>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(WsMessage::Text(json)).await
}
