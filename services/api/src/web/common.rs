//! services/api/src/web/common.rs
//!
//! The success envelope and request helpers shared by every handler.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::error::{RouteError, RouteResult};

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A JSON request body whose rejections render as the failure envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RouteError))]
pub struct JsonBody<T>(pub T);

/// A query string whose rejections render as the failure envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RouteError))]
pub struct QueryParams<T>(pub T);

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: None,
    })
}

pub fn ok_with_message<T: Serialize>(data: T, message: &str) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: Some(message.to_string()),
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Unwraps a required, non-blank request field.
pub fn required(value: Option<String>, field: &str) -> RouteResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(RouteError::validation(format!(
            "필수 항목이 누락되었습니다: {}",
            field
        ))),
    }
}

/// Drops blank optional fields.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks a `YYYY-MM-DD` calendar date.
pub fn calendar_date(value: &str, field: &str) -> RouteResult<()> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| RouteError::validation(format!("{} must be a YYYY-MM-DD date", field)))
}

/// Reads the session token from `Authorization: Bearer ...` or the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
