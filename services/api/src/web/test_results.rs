//! services/api/src/web/test_results.rs
//!
//! Self-test results of the signed-in user (`testResults`). Both routes sit
//! behind `require_auth`.

use axum::{extract::State, response::IntoResponse, Extension};
use serde::Deserialize;
use serde_json::Value;
use simricare_core::domain::{new_document_id, TestResult};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{created, ok, required, JsonBody};
use crate::web::state::{AppState, AuthUser};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    pub test_type: Option<String>,
    #[schema(value_type = Object)]
    pub result: Option<Value>,
}

/// GET /api/test-results - The caller's results, newest first
#[utoipa::path(
    get,
    path = "/api/test-results",
    responses(
        (status = 200, description = "Results of the signed-in user"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
pub async fn list_results_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> RouteResult<impl IntoResponse> {
    let results = state
        .results
        .results_for_user(&user.user_id)
        .await
        .map_err(|e| RouteError::from_port(e, "검사 결과를 불러오지 못했습니다."))?;
    Ok(ok(results))
}

/// POST /api/test-results - Store a result for the caller
#[utoipa::path(
    post,
    path = "/api/test-results",
    request_body = SaveResultRequest,
    responses(
        (status = 201, description = "Result stored"),
        (status = 400, description = "Missing testType or result"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
pub async fn save_result_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<SaveResultRequest>,
) -> RouteResult<impl IntoResponse> {
    let test_type = required(req.test_type, "testType")?;
    let result = match req.result {
        Some(value) if !value.is_null() => value,
        _ => return Err(RouteError::validation("필수 항목이 누락되었습니다: result")),
    };

    let saved = state
        .results
        .save_result(TestResult {
            id: new_document_id(),
            user_id: user.user_id,
            test_type,
            result,
            created_at: state.clock.now(),
        })
        .await
        .map_err(|e| RouteError::from_port(e, "검사 결과를 저장하지 못했습니다."))?;
    Ok(created(saved))
}
