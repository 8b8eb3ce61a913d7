//! services/api/src/web/users.rs
//!
//! User management, preferences and taken tests, served from the sample
//! user directory.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use simricare_core::domain::{UserProfilePatch, UserRole};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{
    ok, ok_with_message, optional, required, session_token, JsonBody, QueryParams,
};
use crate::web::middleware::authenticate;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// `user`, `counselor` or `admin`
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub user_id: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

fn load_failed(e: simricare_core::PortError) -> RouteError {
    RouteError::from_port(e, "사용자 정보를 불러오지 못했습니다.")
}

/// GET /api/users - Every user
#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "All users"))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> RouteResult<impl IntoResponse> {
    let users = state.directory.list_users().await.map_err(load_failed)?;
    Ok(ok(users))
}

/// GET /api/users/{id} - One user
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user"),
        (status = 400, description = "Unknown user")
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RouteResult<impl IntoResponse> {
    let user = state.directory.get_user(&id).await.map_err(load_failed)?;
    Ok(ok(user))
}

/// PUT /api/users/{id} - Update name or phone
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "Unknown user")
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> RouteResult<impl IntoResponse> {
    let patch = UserProfilePatch {
        name: optional(req.name),
        phone: optional(req.phone),
    };
    let user = state
        .directory
        .update_user(&id, patch)
        .await
        .map_err(|e| RouteError::from_port(e, "사용자 정보를 수정하지 못했습니다."))?;
    Ok(ok_with_message(user, "사용자 정보가 수정되었습니다."))
}

/// PUT /api/users/{id}/role - Change a user's role (admins only)
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed"),
        (status = 400, description = "Unknown user or role"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn update_role_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
    JsonBody(req): JsonBody<UpdateRoleRequest>,
) -> RouteResult<impl IntoResponse> {
    let caller = authenticate(&state, session_token(&headers).as_deref()).await?;
    if caller.role != UserRole::Admin {
        return Err(RouteError::Forbidden("관리자만 역할을 변경할 수 있습니다.".to_string()));
    }

    let raw_role = required(req.role, "role")?;
    let role = UserRole::parse(&raw_role)
        .ok_or_else(|| RouteError::validation(format!("유효하지 않은 역할입니다: {}", raw_role)))?;

    let user = state
        .directory
        .set_role(&id, role)
        .await
        .map_err(|e| RouteError::from_port(e, "역할을 변경하지 못했습니다."))?;
    info!(user_id = %user.id, role = role.as_str(), changed_by = %caller.email, "Role changed");
    Ok(ok_with_message(user, "역할이 변경되었습니다."))
}

/// GET /api/user-preferences - Preferences of a user
#[utoipa::path(
    get,
    path = "/api/user-preferences",
    params(("userId" = String, Query, description = "User id")),
    responses(
        (status = 200, description = "Stored or default preferences"),
        (status = 400, description = "Missing userId")
    )
)]
pub async fn get_preferences_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<UserQuery>,
) -> RouteResult<impl IntoResponse> {
    let user_id = required(query.user_id, "userId")?;
    let preferences = state
        .directory
        .preferences(&user_id)
        .await
        .map_err(load_failed)?;
    Ok(ok(preferences))
}

/// PUT /api/user-preferences - Change some preferences of a user
#[utoipa::path(
    put,
    path = "/api/user-preferences",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Merged preferences"),
        (status = 400, description = "Missing userId")
    )
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<UpdatePreferencesRequest>,
) -> RouteResult<impl IntoResponse> {
    let user_id = required(req.user_id, "userId")?;
    let mut preferences = state
        .directory
        .preferences(&user_id)
        .await
        .map_err(load_failed)?;

    if let Some(language) = optional(req.language) {
        preferences.language = language;
    }
    if let Some(theme) = optional(req.theme) {
        preferences.theme = theme;
    }
    if let Some(enabled) = req.email_notifications {
        preferences.email_notifications = enabled;
    }
    if let Some(enabled) = req.push_notifications {
        preferences.push_notifications = enabled;
    }

    let saved = state
        .directory
        .save_preferences(preferences)
        .await
        .map_err(|e| RouteError::from_port(e, "설정을 저장하지 못했습니다."))?;
    Ok(ok_with_message(saved, "설정이 저장되었습니다."))
}

/// GET /api/user-tests - Tests a user has taken
#[utoipa::path(
    get,
    path = "/api/user-tests",
    params(("userId" = String, Query, description = "User id")),
    responses(
        (status = 200, description = "Taken tests"),
        (status = 400, description = "Missing userId")
    )
)]
pub async fn list_user_tests_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<UserQuery>,
) -> RouteResult<impl IntoResponse> {
    let user_id = required(query.user_id, "userId")?;
    let tests = state
        .directory
        .tests_for_user(&user_id)
        .await
        .map_err(load_failed)?;
    Ok(ok(tests))
}
