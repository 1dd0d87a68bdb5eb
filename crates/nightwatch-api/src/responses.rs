//! Response bodies for the nightwatch API

use chrono::{DateTime, Utc};
use nightwatch_util::DeviceId;
use serde::{Deserialize, Serialize};

use crate::{ActionSet, DeviceEventView, DeviceView, ExtraTimeView, ScheduleStatus};

/// Answer to "what should I be doing right now?"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePolicyResponse {
    pub api_version: u32,
    pub device_id: DeviceId,
    pub server_time: DateTime<Utc>,
    pub enforce: bool,
    pub is_quiet_hours: bool,
    pub actions: ActionSet,
    pub schedule: ScheduleStatus,
    pub active_extra_time: Option<ExtraTimeView>,
    pub pending_extra_time: Option<ExtraTimeView>,
    pub status_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAccepted {
    pub ok: bool,
    pub event_id: i64,
}

/// Per-device row of the parent dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub device: DeviceView,
    pub enforce: bool,
    pub status_message: String,
    pub last_event_at: Option<DateTime<Utc>>,
    /// Device went quiet while it should be enforcing
    pub stale: bool,
    pub active_extra_time: Option<ExtraTimeView>,
    pub pending_extra_time: Option<ExtraTimeView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub generated_at: DateTime<Utc>,
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHistoryResponse {
    pub device_id: DeviceId,
    pub events: Vec<DeviceEventView>,
}

/// Credentials of a freshly enrolled device. The secret is only ever
/// returned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledDevice {
    pub device: DeviceView,
    pub device_token: String,
    pub device_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_version: u32,
    pub store_healthy: bool,
}

/// Error codes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    ValidationFailed,
    AlreadyResolved,
    NotFound,
    InternalError,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorBody {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_snake_case_code() {
        let body = ErrorBody::new(ErrorCode::AlreadyResolved, "Already resolved");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "already_resolved");
        assert!(json.get("field").is_none());

        let body = ErrorBody::new(ErrorCode::ValidationFailed, "bad").with_field("timezone");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["field"], "timezone");
    }
}
