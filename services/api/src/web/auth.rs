//! services/api/src/web/auth.rs
//!
//! Credential authentication endpoints: signup, login, logout and session lookup.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use simricare_core::PortError;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{ok, optional, required, session_token, JsonBody};
use crate::web::jwt::{issue_session_token, verify_session_token, SessionClaims};
use crate::web::state::{AppState, AuthUser};

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: AuthUser,
    /// Signed bearer token; the same value is set as the `session` cookie.
    pub token: String,
    pub expires_in_days: i64,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token,
        ttl.num_seconds()
    )
}

/// Stores a session for `user` and answers with its signed token, also set
/// as the `session` cookie.
async fn open_session(
    state: &AppState,
    user: AuthUser,
    status: StatusCode,
) -> RouteResult<impl IntoResponse> {
    let session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    let issued_at = state.clock.now();
    let expires_at = issued_at + ttl;

    state
        .accounts
        .create_auth_session(&session_id, &user.user_id, expires_at)
        .await
        .map_err(|e| RouteError::from_port(e, "세션을 생성하지 못했습니다."))?;

    let claims = SessionClaims::new(&user.user_id, &session_id, &user.email, issued_at, expires_at);
    let token = issue_session_token(&state.config.session_secret, &claims)?;

    let cookie = session_cookie(&token, ttl);
    let response = AuthResponse {
        user,
        token,
        expires_in_days: state.config.session_ttl_days,
    };
    Ok((status, [(header::SET_COOKIE, cookie)], ok(response)))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> RouteResult<impl IntoResponse> {
    let email = required(req.email, "email")?.to_ascii_lowercase();
    let password = required(req.password, "password")?;
    if !email.contains('@') {
        return Err(RouteError::validation("올바른 이메일 형식이 아닙니다."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RouteError::validation(format!(
            "비밀번호는 {}자 이상이어야 합니다.",
            MIN_PASSWORD_LEN
        )));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            RouteError::Internal {
                message: "비밀번호를 처리하지 못했습니다.".to_string(),
                cause: PortError::Unexpected(e.to_string()),
            }
        })?
        .to_string();

    // 2. Create the account
    let name = optional(req.name);
    let account = state
        .accounts
        .create_account(&email, name.as_deref(), &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => RouteError::Rejected("이미 가입된 이메일입니다.".to_string()),
            e => RouteError::from_port(e, "계정을 생성하지 못했습니다."),
        })?;
    info!(user_id = %account.id, "Account created");

    // 3. Open a session
    let user = AuthUser {
        role: state.config.role_policy.role_for(&account.email),
        user_id: account.id,
        email: account.email,
        name: account.name,
    };
    open_session(&state, user, StatusCode::CREATED).await
}

/// POST /api/auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> RouteResult<impl IntoResponse> {
    let email = required(req.email, "email")?;
    let password = required(req.password, "password")?;
    let invalid = || RouteError::Unauthorized("이메일 또는 비밀번호가 올바르지 않습니다.".to_string());

    // 1. Get account by email
    let creds = state
        .accounts
        .get_account_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            e => RouteError::from_port(e, "로그인에 실패했습니다."),
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        RouteError::Internal {
            message: "인증 오류가 발생했습니다.".to_string(),
            cause: PortError::Unexpected(e.to_string()),
        }
    })?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Open a session
    let account = creds.account;
    let user = AuthUser {
        role: state.config.role_policy.role_for(&account.email),
        user_id: account.id,
        email: account.email,
        name: account.name,
    };
    open_session(&state, user, StatusCode::OK).await
}

/// POST /api/auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> RouteResult<impl IntoResponse> {
    let token = session_token(&headers)
        .ok_or_else(|| RouteError::Unauthorized("활성 세션이 없습니다.".to_string()))?;
    let claims = verify_session_token(&state.config.session_secret, &token)?;

    state
        .accounts
        .delete_auth_session(&claims.sid)
        .await
        .map_err(|e| RouteError::from_port(e, "로그아웃에 실패했습니다."))?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        ok(serde_json::Value::Null),
    ))
}

/// GET /api/auth/session - The signed-in user and their role
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Current session", body = AuthUser),
        (status = 401, description = "No active session")
    )
)]
pub async fn session_handler(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    ok(user)
}
