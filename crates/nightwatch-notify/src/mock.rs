//! Mock notifier for testing

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{Notifier, NotifyError, NotifyResult, ParentNotification};

/// Records every notification it is asked to deliver
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<ParentNotification>>,

    /// Configure delivery to fail (notifications are still recorded)
    pub fail: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mock = Self::default();
        mock.fail.store(true, Ordering::SeqCst);
        mock
    }

    /// Notifications received so far
    pub fn sent(&self) -> Vec<ParentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Wait until at least `count` notifications arrived or `timeout` passed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ParentNotification> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn notify(&self, notification: &ParentNotification) -> NotifyResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("mock failure".into()));
        }
        Ok(())
    }
}
