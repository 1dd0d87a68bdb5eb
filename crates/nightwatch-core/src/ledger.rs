//! Extra-time ledger
//!
//! Rows move `pending -> approved` or `pending -> denied`. Approved rows
//! are never deleted; a later approval or grant for the same device clamps
//! any still-live window to end at the moment of the new decision, so at
//! most one approved window is live per device at any instant.

use chrono::{DateTime, Utc};
use nightwatch_store::{ExtraTimeRecord, Resolution, Store};
use nightwatch_util::{DeviceId, ExtraTimeId, NightwatchError, Result};
use std::sync::Arc;
use tracing::info;

/// Bounds for minutes requested by a device or granted on approval
pub const MIN_EXTRA_MINUTES: u32 = 1;
pub const MAX_EXTRA_MINUTES: u32 = 240;

const MAX_REASON_CHARS: usize = 280;

/// Clamp device-requested or approved minutes into `1..=240`
pub fn clamp_request_minutes(minutes: i64) -> u32 {
    minutes.clamp(MIN_EXTRA_MINUTES as i64, MAX_EXTRA_MINUTES as i64) as u32
}

/// Clamp directly granted minutes into `0..=240`; zero cancels
pub fn clamp_grant_minutes(minutes: i64) -> u32 {
    minutes.clamp(0, MAX_EXTRA_MINUTES as i64) as u32
}

/// The approved row live at `now`, preferring the latest start, then the
/// latest end
pub fn pick_active(
    rows: impl IntoIterator<Item = ExtraTimeRecord>,
    now: DateTime<Utc>,
) -> Option<ExtraTimeRecord> {
    rows.into_iter()
        .filter(|row| row.is_live_at(now))
        .max_by_key(|row| (row.starts_at, row.ends_at))
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().chars().take(MAX_REASON_CHARS).collect::<String>())
        .filter(|r| !r.is_empty())
}

/// Extra-time operations over the store
pub struct ExtraTimeLedger {
    store: Arc<dyn Store>,
}

impl ExtraTimeLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a device's request as pending
    pub fn request_extra_time(
        &self,
        device_id: DeviceId,
        minutes: i64,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ExtraTimeRecord> {
        let minutes = clamp_request_minutes(minutes);
        let row = ExtraTimeRecord::pending(device_id, minutes, normalize_reason(reason), now);
        self.store.insert_extra_time_request(&row)?;

        info!(device_id = %device_id, request_id = %row.id, minutes, "Extra time requested");
        Ok(row)
    }

    /// Approve or deny a pending request.
    ///
    /// Approval opens `[now, now + minutes)` where minutes defaults to the
    /// requested amount. A request that is no longer pending fails with
    /// `AlreadyResolved` and is left untouched.
    pub fn decide(
        &self,
        request_id: &ExtraTimeId,
        approve: bool,
        granted_minutes: Option<i64>,
        resolved_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ExtraTimeRecord> {
        let resolution = if approve {
            let requested = match granted_minutes {
                Some(minutes) => minutes,
                None => self
                    .store
                    .get_extra_time(request_id)?
                    .map(|row| row.requested_minutes as i64)
                    .ok_or_else(|| NightwatchError::not_found("extra time request"))?,
            };
            self.store.approve_extra_time(
                request_id,
                resolved_by,
                clamp_request_minutes(requested),
                now,
            )?
        } else {
            self.store.deny_extra_time(request_id, resolved_by)?
        };

        match resolution {
            Resolution::Resolved(row) => {
                info!(
                    request_id = %request_id,
                    device_id = %row.device_id,
                    status = row.status.as_str(),
                    granted_minutes = ?row.granted_minutes,
                    resolved_by,
                    "Extra time decided"
                );
                Ok(row)
            }
            Resolution::AlreadyResolved(row) => {
                info!(request_id = %request_id, status = row.status.as_str(), "Extra time already resolved");
                Err(NightwatchError::AlreadyResolved)
            }
            Resolution::NotFound => Err(NightwatchError::not_found("extra time request")),
        }
    }

    /// Request and approval in one step. Zero minutes ends any live window
    /// now and records an empty grant.
    pub fn grant_direct(
        &self,
        device_id: DeviceId,
        minutes: i64,
        reason: Option<String>,
        resolved_by: &str,
        now: DateTime<Utc>,
    ) -> Result<ExtraTimeRecord> {
        let minutes = clamp_grant_minutes(minutes);
        let row = ExtraTimeRecord::granted(
            device_id,
            minutes,
            normalize_reason(reason),
            resolved_by,
            now,
        );
        self.store.grant_extra_time(&row)?;

        if minutes == 0 {
            info!(device_id = %device_id, resolved_by, "Extra time cancelled");
        } else {
            info!(device_id = %device_id, request_id = %row.id, minutes, resolved_by, "Extra time granted");
        }
        Ok(row)
    }

    /// The approved window live at `now`, if any
    pub fn active_window_for(
        &self,
        device_id: &DeviceId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExtraTimeRecord>> {
        let rows = self.store.live_extra_time(device_id, now)?;
        Ok(pick_active(rows, now))
    }

    /// The most recent pending request, the only one surfaced for display
    pub fn pending_for(&self, device_id: &DeviceId) -> Result<Option<ExtraTimeRecord>> {
        Ok(self.store.latest_pending_extra_time(device_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nightwatch_api::ExtraTimeStatus;
    use nightwatch_store::{Device, DevicePolicy, SqliteStore};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 21, 0, 0).unwrap()
    }

    fn setup() -> (ExtraTimeLedger, Arc<dyn Store>, DeviceId) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let device = Device {
            id: DeviceId::new(),
            name: "Phone".into(),
            icon: None,
            token: "aa".into(),
            secret: "bb".into(),
            parent_id: None,
            created_at: t0(),
            last_seen: None,
        };
        store
            .insert_device(&device, &DevicePolicy::initial(device.id, 30, t0()))
            .unwrap();
        (ExtraTimeLedger::new(store.clone()), store, device.id)
    }

    /// Approved rows live at `now`, counted straight from the store
    fn live_count(store: &Arc<dyn Store>, device: &DeviceId, now: DateTime<Utc>) -> usize {
        store.live_extra_time(device, now).unwrap().len()
    }

    #[test]
    fn minutes_are_clamped() {
        assert_eq!(clamp_request_minutes(0), 1);
        assert_eq!(clamp_request_minutes(-5), 1);
        assert_eq!(clamp_request_minutes(30), 30);
        assert_eq!(clamp_request_minutes(10_000), 240);
        assert_eq!(clamp_grant_minutes(0), 0);
        assert_eq!(clamp_grant_minutes(241), 240);
    }

    #[test]
    fn request_is_pending_and_clamped() {
        let (ledger, _, device) = setup();
        let row = ledger
            .request_extra_time(device, 900, Some("  movie night  ".into()), t0())
            .unwrap();

        assert_eq!(row.status, ExtraTimeStatus::Pending);
        assert_eq!(row.requested_minutes, 240);
        assert_eq!(row.reason.as_deref(), Some("movie night"));
        assert_eq!(ledger.pending_for(&device).unwrap().unwrap().id, row.id);
    }

    #[test]
    fn approve_with_override_minutes() {
        let (ledger, _, device) = setup();
        let request = ledger.request_extra_time(device, 30, None, t0()).unwrap();

        let decided_at = t0() + Duration::minutes(2);
        let row = ledger
            .decide(&request.id, true, Some(15), "parent-1", decided_at)
            .unwrap();
        assert_eq!(row.starts_at, Some(decided_at));
        assert_eq!(row.ends_at, Some(decided_at + Duration::minutes(15)));

        let active = ledger.active_window_for(&device, decided_at).unwrap().unwrap();
        assert_eq!(active.id, request.id);
        assert!(ledger
            .active_window_for(&device, decided_at + Duration::minutes(15))
            .unwrap()
            .is_none());
    }

    #[test]
    fn approve_defaults_to_requested_minutes() {
        let (ledger, _, device) = setup();
        let request = ledger.request_extra_time(device, 45, None, t0()).unwrap();
        let row = ledger.decide(&request.id, true, None, "admin", t0()).unwrap();
        assert_eq!(row.granted_minutes, Some(45));
    }

    #[test]
    fn second_decision_is_already_resolved_and_changes_nothing() {
        let (ledger, store, device) = setup();
        let request = ledger.request_extra_time(device, 30, None, t0()).unwrap();
        let first = ledger
            .decide(&request.id, true, Some(20), "parent-1", t0())
            .unwrap();

        let later = t0() + Duration::minutes(5);
        for approve in [true, false] {
            let result = ledger.decide(&request.id, approve, Some(60), "parent-2", later);
            assert!(matches!(result, Err(NightwatchError::AlreadyResolved)));
        }

        let stored = store.get_extra_time(&request.id).unwrap().unwrap();
        assert_eq!(stored.granted_minutes, first.granted_minutes);
        assert_eq!(stored.ends_at, first.ends_at);
        assert_eq!(stored.resolved_by.as_deref(), Some("parent-1"));
    }

    #[test]
    fn deny_is_terminal() {
        let (ledger, _, device) = setup();
        let request = ledger.request_extra_time(device, 30, None, t0()).unwrap();

        let row = ledger.decide(&request.id, false, None, "parent-1", t0()).unwrap();
        assert_eq!(row.status, ExtraTimeStatus::Denied);
        assert!(ledger.active_window_for(&device, t0()).unwrap().is_none());
        assert!(ledger.pending_for(&device).unwrap().is_none());

        let again = ledger.decide(&request.id, true, None, "parent-1", t0());
        assert!(matches!(again, Err(NightwatchError::AlreadyResolved)));
    }

    #[test]
    fn deciding_unknown_request_is_not_found() {
        let (ledger, _, _) = setup();
        let id = ExtraTimeId::new();
        assert!(matches!(
            ledger.decide(&id, true, None, "admin", t0()),
            Err(NightwatchError::NotFound(_))
        ));
        assert!(matches!(
            ledger.decide(&id, false, None, "admin", t0()),
            Err(NightwatchError::NotFound(_))
        ));
    }

    #[test]
    fn zero_minute_grant_cancels_active_window() {
        let (ledger, store, device) = setup();
        let grant = ledger.grant_direct(device, 30, None, "parent-1", t0()).unwrap();

        let cancel_at = t0() + Duration::minutes(10);
        ledger.grant_direct(device, 0, None, "parent-1", cancel_at).unwrap();

        let clamped = store.get_extra_time(&grant.id).unwrap().unwrap();
        assert_eq!(clamped.ends_at, Some(cancel_at));
        assert!(ledger.active_window_for(&device, cancel_at).unwrap().is_none());
    }

    #[test]
    fn at_most_one_live_window_after_any_sequence() {
        let (ledger, store, device) = setup();
        let mut now = t0();

        let pending: Vec<_> = (0..3)
            .map(|i| {
                ledger
                    .request_extra_time(device, 10 + i * 10, None, now)
                    .unwrap()
            })
            .collect();

        ledger.grant_direct(device, 60, None, "parent-1", now).unwrap();
        now += Duration::minutes(1);
        ledger.decide(&pending[0].id, true, None, "parent-1", now).unwrap();
        ledger.grant_direct(device, 90, None, "parent-2", now).unwrap();
        now += Duration::minutes(3);
        ledger.decide(&pending[1].id, true, Some(5), "parent-1", now).unwrap();
        ledger.decide(&pending[2].id, false, None, "parent-1", now).unwrap();

        for offset in [0, 1, 2, 4, 30, 120] {
            let sample = now + Duration::minutes(offset);
            assert!(live_count(&store, &device, sample) <= 1, "offset {offset}");
        }
        let active = ledger.active_window_for(&device, now).unwrap().unwrap();
        assert_eq!(active.id, pending[1].id);
    }

    #[test]
    fn pick_active_breaks_ties_by_latest_start_then_end() {
        let device = DeviceId::new();
        let early = ExtraTimeRecord::granted(device, 60, None, "a", t0());
        let late_short =
            ExtraTimeRecord::granted(device, 10, None, "a", t0() + Duration::minutes(5));
        let late_long =
            ExtraTimeRecord::granted(device, 20, None, "a", t0() + Duration::minutes(5));

        let now = t0() + Duration::minutes(6);
        let picked = pick_active(
            vec![early.clone(), late_short.clone(), late_long.clone()],
            now,
        )
        .unwrap();
        assert_eq!(picked.id, late_long.id);

        assert_eq!(pick_active(vec![early.clone()], now).unwrap().id, early.id);
        assert!(pick_active(vec![early], t0() + Duration::hours(2)).is_none());
    }
}
