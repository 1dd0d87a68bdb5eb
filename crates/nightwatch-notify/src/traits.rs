//! Notifier trait and payloads

use async_trait::async_trait;
use nightwatch_util::{DeviceId, ExtraTimeId, ParentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from notification delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Relay rejected notification with status {0}")]
    Rejected(u16),

    #[error("Notifier setup failed: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.to_string())
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Something a parent should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParentNotification {
    ExtraTimeRequested {
        device_id: DeviceId,
        device_name: String,
        parent_id: Option<ParentId>,
        request_id: ExtraTimeId,
        minutes: u32,
        reason: Option<String>,
    },
}

impl ParentNotification {
    /// Parent to deliver to, if the device has an owner
    pub fn parent_id(&self) -> Option<&ParentId> {
        match self {
            ParentNotification::ExtraTimeRequested { parent_id, .. } => parent_id.as_ref(),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        match self {
            ParentNotification::ExtraTimeRequested { device_id, .. } => *device_id,
        }
    }

    /// One-line text suitable for a push banner
    pub fn summary(&self) -> String {
        match self {
            ParentNotification::ExtraTimeRequested {
                device_name,
                minutes,
                reason,
                ..
            } => match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => format!(
                    "{} asks for {} more minutes: {}",
                    device_name, minutes, reason
                ),
                None => format!("{} asks for {} more minutes", device_name, minutes),
            },
        }
    }
}

/// Delivery channel to parents.
///
/// Delivery is best effort. Callers never let a failure here change what
/// they return to the device.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &ParentNotification) -> NotifyResult<()>;
}
