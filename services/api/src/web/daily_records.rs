//! services/api/src/web/daily_records.rs
//!
//! Counselor-facing daily client records (`dailyRecords`).

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use simricare_core::domain::{new_document_id, DailyRecord, DailyRecordFilter, DailyRecordPatch};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{RouteError, RouteResult};
use crate::web::common::{
    calendar_date, created, ok, optional, required, JsonBody, QueryParams,
};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDailyRecordRequest {
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub mood: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDailyRecordRequest {
    pub id: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecordQuery {
    pub date: Option<String>,
    pub client_id: Option<String>,
    pub counselor_id: Option<String>,
}

/// POST /api/daily-records - Create a daily record
#[utoipa::path(
    post,
    path = "/api/daily-records",
    request_body = CreateDailyRecordRequest,
    responses(
        (status = 201, description = "Record created"),
        (status = 400, description = "Missing clientId, date or content"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateDailyRecordRequest>,
) -> RouteResult<impl IntoResponse> {
    let client_id = required(req.client_id, "clientId")?;
    let date = required(req.date, "date")?;
    calendar_date(&date, "date")?;
    let content = required(req.content, "content")?;

    let now = state.clock.now();
    let record = DailyRecord {
        id: new_document_id(),
        client_id,
        counselor_id: optional(req.counselor_id),
        date,
        mood: optional(req.mood),
        content,
        notes: optional(req.notes),
        created_at: now,
        updated_at: now,
    };

    let saved = state
        .daily_records
        .save_record(record)
        .await
        .map_err(|e| RouteError::from_port(e, "일일 기록을 저장하지 못했습니다."))?;
    Ok(created(saved))
}

/// GET /api/daily-records - Filter daily records
#[utoipa::path(
    get,
    path = "/api/daily-records",
    params(
        ("date" = Option<String>, Query, description = "Calendar day, YYYY-MM-DD"),
        ("clientId" = Option<String>, Query, description = "Client id"),
        ("counselorId" = Option<String>, Query, description = "Counselor id")
    ),
    responses(
        (status = 200, description = "Matching records, newest day first"),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn list_records_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<DailyRecordQuery>,
) -> RouteResult<impl IntoResponse> {
    let filter = DailyRecordFilter {
        date: optional(query.date),
        client_id: optional(query.client_id),
        counselor_id: optional(query.counselor_id),
    };
    if let Some(date) = &filter.date {
        calendar_date(date, "date")?;
    }

    let records = state
        .daily_records
        .find_records(&filter)
        .await
        .map_err(|e| RouteError::from_port(e, "일일 기록을 불러오지 못했습니다."))?;
    Ok(ok(records))
}

/// PUT /api/daily-records - Update a daily record
#[utoipa::path(
    put,
    path = "/api/daily-records",
    request_body = UpdateDailyRecordRequest,
    responses(
        (status = 200, description = "Record updated"),
        (status = 400, description = "Missing id or unknown record"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_record_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<UpdateDailyRecordRequest>,
) -> RouteResult<impl IntoResponse> {
    let id = required(req.id, "id")?;
    let patch = DailyRecordPatch {
        date: optional(req.date),
        mood: optional(req.mood),
        content: optional(req.content),
        notes: optional(req.notes),
    };
    if let Some(date) = &patch.date {
        calendar_date(date, "date")?;
    }

    let updated = state
        .daily_records
        .update_record(&id, patch, state.clock.now())
        .await
        .map_err(|e| RouteError::from_port(e, "일일 기록을 수정하지 못했습니다."))?;
    Ok(ok(updated))
}
