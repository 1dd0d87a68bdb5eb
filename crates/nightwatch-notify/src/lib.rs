//! Parent notification delivery for nightwatch
//!
//! Provides:
//! - [`Notifier`] trait for delivery channels
//! - [`WebhookNotifier`] posting JSON to a push relay
//! - [`LogNotifier`] for deployments without a relay
//! - [`MockNotifier`] for tests
//! - [`dispatch`] to deliver without waiting on the outcome

mod mock;
mod traits;
mod webhook;

pub use mock::*;
pub use traits::*;
pub use webhook::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &ParentNotification) -> NotifyResult<()> {
        info!(
            device_id = %notification.device_id(),
            parent_id = ?notification.parent_id().map(|p| p.as_str()),
            summary = %notification.summary(),
            "Parent notification"
        );
        Ok(())
    }
}

/// Deliver in the background. The outcome is only logged.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: ParentNotification) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.notify(&notification).await {
            Ok(()) => debug!(notifier = notifier.name(), "Notification dispatched"),
            Err(e) => warn!(
                notifier = notifier.name(),
                device_id = %notification.device_id(),
                error = %e,
                "Notification delivery failed"
            ),
        }
    })
}
