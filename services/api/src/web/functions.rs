//! services/api/src/web/functions.rs
//!
//! Endpoints of the serverless functions bundle: a generic echo and the
//! client log sink (`logs`).

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, Uri},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use simricare_core::domain::{new_document_id, LogEntry};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{ok, optional, required, JsonBody};
use crate::web::state::AppState;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Deserialize, ToSchema)]
pub struct LogInput {
    pub level: Option<String>,
    pub message: Option<String>,
    #[schema(value_type = Object)]
    pub context: Option<Value>,
}

#[derive(Deserialize, ToSchema)]
pub struct ProcessLogsRequest {
    pub logs: Option<Vec<LogInput>>,
}

/// ANY /functions/api - Echoes the request back
#[utoipa::path(
    post,
    path = "/functions/api",
    request_body(content = Object, content_type = "application/json"),
    responses((status = 200, description = "Echo of method, path and body"))
)]
pub async fn echo_handler(method: Method, uri: Uri, body: Bytes) -> impl IntoResponse {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    Json(json!({
        "message": "Hello from Simri Care functions!",
        "method": method.as_str(),
        "path": uri.path(),
        "body": body,
    }))
}

/// POST /functions/process-logs - Stores a batch of client log entries
#[utoipa::path(
    post,
    path = "/functions/process-logs",
    request_body = ProcessLogsRequest,
    responses(
        (status = 200, description = "Number of stored entries"),
        (status = 400, description = "Empty batch or entry without message")
    )
)]
pub async fn process_logs_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ProcessLogsRequest>,
) -> RouteResult<impl IntoResponse> {
    let inputs = req.logs.unwrap_or_default();
    if inputs.is_empty() {
        return Err(RouteError::validation("logs 항목이 비어 있습니다."));
    }

    let now = state.clock.now();
    let mut entries = Vec::with_capacity(inputs.len());
    for input in inputs {
        let level = optional(input.level)
            .map(|l| l.to_ascii_lowercase())
            .unwrap_or_else(|| "info".to_string());
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(RouteError::validation(format!("알 수 없는 로그 레벨입니다: {}", level)));
        }
        entries.push(LogEntry {
            id: new_document_id(),
            level,
            message: required(input.message, "message")?,
            context: input.context.unwrap_or(Value::Null),
            received_at: now,
        });
    }

    let mut processed = 0;
    for entry in entries {
        if entry.level == "error" {
            warn!(message = %entry.message, "Client reported an error");
        }
        state
            .logs
            .append_log(entry)
            .await
            .map_err(|e| RouteError::from_port(e, "로그를 저장하지 못했습니다."))?;
        processed += 1;
    }
    info!(processed, "Client logs stored");
    Ok(ok(json!({ "processed": processed })))
}
