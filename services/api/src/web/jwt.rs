//! services/api/src/web/jwt.rs
//!
//! Signed HS256 session tokens. The token carries the account id and the id
//! of its stored `authSessions` entry, so logout can revoke it before `exp`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use simricare_core::PortError;
use tracing::debug;

use crate::error::RouteError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id.
    pub sub: String,
    /// Stored session id.
    pub sid: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(
        account_id: &str,
        session_id: &str,
        email: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: account_id.to_string(),
            sid: session_id.to_string(),
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

pub fn issue_session_token(secret: &str, claims: &SessionClaims) -> Result<String, RouteError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| RouteError::Internal {
        message: "세션 토큰을 발급하지 못했습니다.".to_string(),
        cause: PortError::Unexpected(e.to_string()),
    })
}

/// Checks the signature and `exp` of a session token.
pub fn verify_session_token(secret: &str, token: &str) -> Result<SessionClaims, RouteError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256];
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|t| t.claims)
    .map_err(|e| {
        debug!("Rejected session token: {}", e);
        RouteError::Unauthorized("유효하지 않은 인증 토큰입니다.".to_string())
    })
}
