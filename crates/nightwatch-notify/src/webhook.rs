//! Webhook notifier posting JSON to a push relay

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::{Notifier, NotifyError, NotifyResult, ParentNotification};

/// Posts each notification to a relay that owns the push transport
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    summary: String,
    #[serde(flatten)]
    notification: &'a ParentNotification,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, notification: &ParentNotification) -> NotifyResult<()> {
        let payload = WebhookPayload {
            summary: notification.summary(),
            notification,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!(
            device_id = %notification.device_id(),
            status = status.as_u16(),
            "Webhook notification delivered"
        );
        Ok(())
    }
}
