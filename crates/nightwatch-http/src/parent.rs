//! Parent surface

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use nightwatch_api::{
    DashboardResponse, EnrollDevice, EnrolledDevice, EventHistoryResponse, ExtraTimeDecision,
    ExtraTimeGrant, ExtraTimeView, PolicyPatch, PolicyView,
};
use serde::Deserialize;

use crate::extract::{ParentCaller, parse_device_id, parse_json, parse_request_id};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/parent/devices
pub async fn enroll_device(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrolledDevice>), ApiError> {
    let request: EnrollDevice = parse_json(&body)?;
    let enrolled = state.engine.enroll_device(&caller, request, state.now())?;
    Ok((StatusCode::CREATED, Json(enrolled)))
}

/// DELETE /api/v1/parent/devices/:device_id
pub async fn delete_device(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(device_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let device_id = parse_device_id(&device_id)?;
    state.engine.delete_device(&caller, &device_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/parent/devices/:device_id/policy
pub async fn get_policy(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(device_id): Path<String>,
) -> Result<Json<PolicyView>, ApiError> {
    let device_id = parse_device_id(&device_id)?;
    Ok(Json(state.engine.get_policy(&caller, &device_id, state.now())?))
}

/// PATCH /api/v1/parent/devices/:device_id/policy
pub async fn patch_policy(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<Json<PolicyView>, ApiError> {
    let device_id = parse_device_id(&device_id)?;
    let patch: PolicyPatch = parse_json(&body)?;
    let policy = state
        .engine
        .patch_policy(&caller, &device_id, patch, state.now())?;
    Ok(Json(policy))
}

/// GET /api/v1/parent/devices/:device_id/events
pub async fn event_history(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<EventHistoryResponse>, ApiError> {
    let device_id = parse_device_id(&device_id)?;
    let history = state
        .engine
        .event_history(&caller, &device_id, query.limit)?;
    Ok(Json(history))
}

/// POST /api/v1/parent/devices/:device_id/extra-time
pub async fn grant_extra_time(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ExtraTimeView>), ApiError> {
    let device_id = parse_device_id(&device_id)?;
    let grant: ExtraTimeGrant = parse_json(&body)?;
    let view = state
        .engine
        .grant_extra_time(&caller, &device_id, grant, state.now())?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/parent/extra-time/:request_id/decision
pub async fn decide_extra_time(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
    Path(request_id): Path<String>,
    body: Bytes,
) -> Result<Json<ExtraTimeView>, ApiError> {
    let request_id = parse_request_id(&request_id)?;
    let decision: ExtraTimeDecision = parse_json(&body)?;
    let view = state
        .engine
        .decide_extra_time(&caller, &request_id, decision, state.now())?;
    Ok(Json(view))
}

/// GET /api/v1/parent/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    ParentCaller(caller): ParentCaller,
) -> Result<Json<DashboardResponse>, ApiError> {
    Ok(Json(state.engine.dashboard(&caller, state.now())?))
}
