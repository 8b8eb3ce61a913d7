//! services/api/src/web/test_assignments.rs
//!
//! Psychological tests assigned by counselors to clients (`testAssignments`).

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use simricare_core::domain::{
    new_document_id, AssignmentAction, AssignmentFilter, AssignmentStatus, TestAssignment,
};
use simricare_core::PortError;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{
    calendar_date, created, ok, ok_with_message, optional, required, JsonBody, QueryParams,
};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignTestRequest {
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
    pub test_type: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    pub assignment_id: Option<String>,
    /// `start`, `complete` or `cancel`
    pub action: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuery {
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
    pub status: Option<String>,
}

/// POST /api/test-assignments - Assign a test to a client
#[utoipa::path(
    post,
    path = "/api/test-assignments",
    request_body = AssignTestRequest,
    responses(
        (status = 201, description = "Test assigned"),
        (status = 400, description = "Missing fields, or the same test is already open for this client"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn assign_test_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<AssignTestRequest>,
) -> RouteResult<impl IntoResponse> {
    let client_id = required(req.client_id, "clientId")?;
    let counselor_id = required(req.counselor_id, "counselorId")?;
    let test_type = required(req.test_type, "testType")?;
    let due_date = optional(req.due_date);
    if let Some(due) = &due_date {
        calendar_date(due, "dueDate")?;
    }

    let assignment = TestAssignment {
        id: new_document_id(),
        client_id,
        counselor_id,
        test_type,
        status: AssignmentStatus::Assigned,
        due_date,
        notes: optional(req.notes),
        assigned_at: state.clock.now(),
        started_at: None,
        completed_at: None,
    };

    let saved = state
        .assignments
        .assign(assignment)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                RouteError::Rejected("이미 할당되어 진행 중인 검사입니다.".to_string())
            }
            e => RouteError::from_port(e, "검사를 할당하지 못했습니다."),
        })?;
    info!(assignment_id = %saved.id, test_type = %saved.test_type, "Test assigned");
    Ok(created(saved))
}

/// GET /api/test-assignments - Filter assignments
#[utoipa::path(
    get,
    path = "/api/test-assignments",
    params(
        ("clientId" = Option<String>, Query, description = "Client id"),
        ("counselorId" = Option<String>, Query, description = "Counselor id"),
        ("status" = Option<String>, Query, description = "assigned, in_progress, completed or cancelled")
    ),
    responses(
        (status = 200, description = "Matching assignments, newest first"),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn list_assignments_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<AssignmentQuery>,
) -> RouteResult<impl IntoResponse> {
    let status = match optional(query.status) {
        Some(raw) => Some(AssignmentStatus::parse(&raw).ok_or_else(|| {
            RouteError::validation(format!("알 수 없는 상태입니다: {}", raw))
        })?),
        None => None,
    };
    let filter = AssignmentFilter {
        client_id: optional(query.client_id),
        counselor_id: optional(query.counselor_id),
        status,
    };

    let assignments = state
        .assignments
        .find_assignments(&filter)
        .await
        .map_err(|e| RouteError::from_port(e, "검사 할당 목록을 불러오지 못했습니다."))?;
    Ok(ok(assignments))
}

/// PUT /api/test-assignments - Start, complete or cancel an assignment
#[utoipa::path(
    put,
    path = "/api/test-assignments",
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated"),
        (status = 400, description = "Missing fields, unknown assignment, invalid action or transition"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_assignment_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<UpdateAssignmentRequest>,
) -> RouteResult<impl IntoResponse> {
    let assignment_id = required(req.assignment_id, "assignmentId")?;
    let raw_action = required(req.action, "action")?;
    let action = AssignmentAction::parse(&raw_action).ok_or_else(|| {
        RouteError::validation(format!("유효하지 않은 작업입니다: {}", raw_action))
    })?;

    let updated = state
        .assignments
        .apply_action(&assignment_id, action, state.clock.now())
        .await
        .map_err(|e| RouteError::from_port(e, "검사 상태를 변경하지 못했습니다."))?;

    let message = match updated.status {
        AssignmentStatus::InProgress => "검사가 시작되었습니다.",
        AssignmentStatus::Completed => "검사가 완료되었습니다.",
        AssignmentStatus::Cancelled => "검사가 취소되었습니다.",
        AssignmentStatus::Assigned => "검사가 할당되었습니다.",
    };
    Ok(ok_with_message(updated, message))
}
