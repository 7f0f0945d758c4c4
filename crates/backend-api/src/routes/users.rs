use axum::{extract::State, http::HeaderMap, Json};
use herald_auth::UserSummary;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{routes::auth::UserResponse, util::require_bearer, ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfileResponse {
    pub user: UserResponse,
}

/// A user as seen by other users. No email, no credentials.
#[derive(Debug, Serialize, ToSchema)]
pub struct DirectoryEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UserSummary> for DirectoryEntry {
    fn from(value: UserSummary) -> Self {
        Self {
            id: value.public_id,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DirectoryResponse {
    pub users: Vec<DirectoryEntry>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Every other user", body = DirectoryResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DirectoryResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    let users = state
        .authenticator()
        .list_directory(user.id)
        .await?
        .into_iter()
        .map(DirectoryEntry::from)
        .collect();

    Ok(Json(DirectoryResponse { users }))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserProfileResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let token = require_bearer(&headers)?;
    let (user, _) = state.authenticate(&token).await?;

    Ok(Json(UserProfileResponse { user: user.into() }))
}
