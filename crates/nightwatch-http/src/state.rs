//! Shared handler state

use chrono::{DateTime, Utc};
use nightwatch_core::PolicyEngine;
use nightwatch_notify::Notifier;
use std::sync::Arc;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PolicyEngine>,
    pub notifier: Arc<dyn Notifier>,
    clock: Clock,
}

impl AppState {
    pub fn new(engine: Arc<PolicyEngine>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            notifier,
            clock: Arc::new(nightwatch_util::now),
        }
    }

    /// Replace the service clock
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
