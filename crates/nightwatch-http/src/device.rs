//! Device surface
//!
//! Handlers take the raw body so the signed-timestamp scheme sees exactly
//! the bytes the device signed.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use nightwatch_api::{
    DevicePolicyResponse, EventAccepted, EventReport, ExtraTimeAsk, ExtraTimeView,
};
use nightwatch_core::AuthRequest;
use nightwatch_store::Device;
use tracing::info;

use crate::extract::{HttpHeaders, parse_json};
use crate::{ApiError, AppState};

fn authenticate(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Device, ApiError> {
    let headers = HttpHeaders(headers);
    let request = AuthRequest {
        method: method.as_str(),
        path: uri.path(),
        body,
        headers: &headers,
    };
    Ok(state.engine.authenticate_device(&request, state.now())?)
}

/// GET /api/v1/device/policy
pub async fn get_policy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DevicePolicyResponse>, ApiError> {
    let device = authenticate(&state, &method, &uri, &headers, &body)?;
    let response = state.engine.device_policy(&device, state.now())?;
    Ok(Json(response))
}

/// POST /api/v1/device/events
///
/// An authenticated post counts as a sighting even when the body is rejected.
pub async fn post_event(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventAccepted>, ApiError> {
    let device = authenticate(&state, &method, &uri, &headers, &body)?;
    let now = state.now();
    let report: EventReport = match parse_json(&body) {
        Ok(report) => report,
        Err(e) => {
            state.engine.mark_seen(&device, now)?;
            return Err(e);
        }
    };
    let accepted = state.engine.record_event(&device, report, now)?;
    Ok(Json(accepted))
}

/// POST /api/v1/device/extra-time
///
/// The parent notification goes out in the background; the response does
/// not wait for it.
pub async fn request_extra_time(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ExtraTimeView>), ApiError> {
    let device = authenticate(&state, &method, &uri, &headers, &body)?;
    let ask: ExtraTimeAsk = parse_json(&body)?;

    let (view, notification) = state
        .engine
        .request_extra_time(&device, ask, state.now())?;
    info!(
        device_id = %device.id,
        request_id = %view.id,
        notifier = state.notifier.name(),
        "Notifying parent of extra time request"
    );
    nightwatch_notify::dispatch(state.notifier.clone(), notification);

    Ok((StatusCode::CREATED, Json(view)))
}
