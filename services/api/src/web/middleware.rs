//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use simricare_core::PortError;
use std::sync::Arc;
use tracing::debug;

use crate::error::RouteError;
use crate::web::common::session_token;
use crate::web::jwt::verify_session_token;
use crate::web::state::{AppState, AuthUser};

/// Middleware that verifies the signed session token and resolves the caller.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let user = authenticate(&state, session_token(req.headers()).as_deref()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Resolves a session token to the signed-in user and their role. The token
/// must carry a valid signature and `exp`, and its stored session must still
/// be live.
pub async fn authenticate(state: &AppState, token: Option<&str>) -> Result<AuthUser, RouteError> {
    let unauthorized = || RouteError::Unauthorized("인증 토큰이 필요합니다.".to_string());
    let token = token.ok_or_else(unauthorized)?;

    let claims = verify_session_token(&state.config.session_secret, token)?;

    let account_id = state
        .accounts
        .validate_auth_session(&claims.sid, state.clock.now())
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {:?}", e);
            RouteError::Unauthorized("유효하지 않은 인증 토큰입니다.".to_string())
        })?;
    if account_id != claims.sub {
        debug!(session_id = %claims.sid, "Session token subject does not match its session");
        return Err(RouteError::Unauthorized("유효하지 않은 인증 토큰입니다.".to_string()));
    }

    let account = state
        .accounts
        .get_account(&account_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => unauthorized(),
            e => RouteError::from_port(e, "사용자 정보를 불러오지 못했습니다."),
        })?;

    Ok(AuthUser {
        role: state.config.role_policy.role_for(&account.email),
        user_id: account.id,
        email: account.email,
        name: account.name,
    })
}
