//! HTTP transport for nightwatch
//!
//! Two surfaces share one router:
//! - Device routes, authenticated by the engine's auth gate
//! - Parent routes, gated on the admin token or a parent session
//!
//! `/health` is open.

mod device;
mod error;
mod extract;
mod parent;
mod state;

pub use error::*;
pub use extract::{HttpHeaders, PARENT_SESSION_HEADER, ParentCaller};
pub use state::*;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use nightwatch_api::HealthResponse;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the API router
pub fn create_router(state: AppState) -> Router {
    let device_routes = Router::new()
        .route("/api/v1/device/policy", get(device::get_policy))
        .route("/api/v1/device/events", post(device::post_event))
        .route("/api/v1/device/extra-time", post(device::request_extra_time));

    let parent_routes = Router::new()
        .route("/api/v1/parent/dashboard", get(parent::dashboard))
        .route("/api/v1/parent/devices", post(parent::enroll_device))
        .route("/api/v1/parent/devices/:device_id", delete(parent::delete_device))
        .route(
            "/api/v1/parent/devices/:device_id/policy",
            get(parent::get_policy).patch(parent::patch_policy),
        )
        .route(
            "/api/v1/parent/devices/:device_id/events",
            get(parent::event_history),
        )
        .route(
            "/api/v1/parent/devices/:device_id/extra-time",
            post(parent::grant_extra_time),
        )
        .route(
            "/api/v1/parent/extra-time/:request_id/decision",
            post(parent::decide_extra_time),
        );

    Router::new()
        .route("/health", get(health))
        .merge(device_routes)
        .merge(parent_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.engine.health())
}

/// Serve until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
