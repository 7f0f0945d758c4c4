use axum::Json;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::users::list_users,
        crate::routes::users::get_current_user,
        crate::routes::messages::list_messages,
        crate::routes::messages::create_message,
        crate::routes::websocket::websocket_handler
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::RegisterRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::SessionResponse,
            crate::routes::auth::UserResponse,
            crate::routes::users::UserProfileResponse,
            crate::routes::users::DirectoryEntry,
            crate::routes::users::DirectoryResponse,
            crate::routes::messages::CreateMessageRequest,
            crate::routes::messages::MessageResponse,
            crate::routes::messages::MessagesResponse,
            herald_delivery::Message,
            herald_delivery::DeliveryEntry,
            herald_delivery::DeliveryStatus,
            herald_delivery::SenderProfile,
            herald_delivery::FileDescriptor
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Password accounts and sessions"),
        (name = "Users", description = "User directory"),
        (name = "Messages", description = "Sending and reading conversation messages"),
        (name = "WebSocket", description = "Realtime delivery stream")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
