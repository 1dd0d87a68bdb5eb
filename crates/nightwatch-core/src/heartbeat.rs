//! Check-in gap detection

use chrono::{DateTime, Duration, Utc};

/// Whether a device that should be enforcing has gone quiet.
///
/// A device that should not be running is never stale. One that should be
/// running and never reported is stale immediately.
pub fn is_stale(
    should_be_running: bool,
    last_event: Option<DateTime<Utc>>,
    gap_threshold: Duration,
    now: DateTime<Utc>,
) -> bool {
    if !should_be_running {
        return false;
    }
    match last_event {
        None => true,
        Some(last) => now - last > gap_threshold,
    }
}

/// Whether a policy fetch should log a heartbeat event, given the newest
/// heartbeat already in the log
pub fn heartbeat_due(
    last_heartbeat: Option<DateTime<Utc>>,
    throttle: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_heartbeat {
        None => true,
        Some(last) => now - last >= throttle,
    }
}
