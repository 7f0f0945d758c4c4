use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use herald_auth::AuthError;
use herald_delivery::DeliveryError;
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "request body rejected");
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<DeliveryError> for ApiError {
    fn from(error: DeliveryError) -> Self {
        match error {
            DeliveryError::ConversationNotFound { .. }
            | DeliveryError::MessageNotFound { .. }
            | DeliveryError::DeliveryEntryNotFound { .. } => {
                debug!(%error, "resource not found");
                Self::not_found(error.to_string())
            }
            DeliveryError::Forbidden { reason } => Self::forbidden(reason),
            DeliveryError::Validation { message } => Self::bad_request(message),
            DeliveryError::Database(_) | DeliveryError::Internal { .. } => {
                error!(error = ?error, "delivery error");
                Self::internal_server_error()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                return Self::internal_server_error();
            }
        };
        debug!(%error, %status, "auth request rejected");
        Self::new(status, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_errors_map_to_http_statuses() {
        let cases = [
            (
                DeliveryError::conversation_not_found("c1"),
                StatusCode::NOT_FOUND,
            ),
            (DeliveryError::message_not_found("m1"), StatusCode::NOT_FOUND),
            (
                DeliveryError::forbidden("Not a participant of this conversation"),
                StatusCode::FORBIDDEN,
            ),
            (DeliveryError::validation("empty"), StatusCode::BAD_REQUEST),
            (
                DeliveryError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DeliveryError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let api_error: ApiError = error.into();
            assert_eq!(api_error.status, expected, "{}", api_error.message);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let api_error: ApiError = DeliveryError::internal("pool exhausted at 10.0.0.3").into();
        assert_eq!(api_error.message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn forbidden_keeps_reason() {
        let api_error: ApiError =
            DeliveryError::forbidden("Not a participant of this conversation").into();
        assert_eq!(api_error.message, "Not a participant of this conversation");
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        let cases = [
            (AuthError::SessionExpired, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::UserExists, StatusCode::CONFLICT),
            (
                AuthError::InvalidInput("a valid email is required".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            let api_error: ApiError = error.into();
            assert_eq!(api_error.status, expected, "{}", api_error.message);
        }
    }
}
