//! Store trait definitions

use chrono::{DateTime, Utc};
use nightwatch_util::{DeviceId, ExtraTimeId, ParentId};

use crate::{
    Device, DeviceEventRecord, DevicePolicy, ExtraTimeRecord, NewDeviceEvent, StoreResult,
};

/// Outcome of resolving a pending extra-time request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The row was pending and now carries the decision
    Resolved(ExtraTimeRecord),
    /// The row was already approved or denied; nothing changed
    AlreadyResolved(ExtraTimeRecord),
    NotFound,
}

/// Main store trait
pub trait Store: Send + Sync {
    // Devices

    /// Insert a device together with its initial policy
    fn insert_device(&self, device: &Device, policy: &DevicePolicy) -> StoreResult<()>;

    fn get_device(&self, id: &DeviceId) -> StoreResult<Option<Device>>;

    fn find_device_by_token(&self, token: &str) -> StoreResult<Option<Device>>;

    fn find_device_by_secret(&self, secret: &str) -> StoreResult<Option<Device>>;

    /// Devices owned by `owner`, or every device when `owner` is `None`
    fn list_devices(&self, owner: Option<&ParentId>) -> StoreResult<Vec<Device>>;

    /// Delete a device and everything hanging off it. Returns false if absent.
    fn delete_device(&self, id: &DeviceId) -> StoreResult<bool>;

    /// Move last-seen forward (never backward)
    fn touch_last_seen(&self, id: &DeviceId, at: DateTime<Utc>) -> StoreResult<()>;

    // Policies

    fn get_policy(&self, device_id: &DeviceId) -> StoreResult<Option<DevicePolicy>>;

    fn save_policy(&self, policy: &DevicePolicy) -> StoreResult<()>;

    // Event log

    /// Append an event, returning its id
    fn append_event(&self, event: &NewDeviceEvent) -> StoreResult<i64>;

    /// Most recent events, newest first
    fn recent_events(&self, device_id: &DeviceId, limit: usize)
    -> StoreResult<Vec<DeviceEventRecord>>;

    /// Timestamp of the newest event of any kind
    fn latest_event_at(&self, device_id: &DeviceId) -> StoreResult<Option<DateTime<Utc>>>;

    /// Append a heartbeat at `now` when `due` accepts the newest heartbeat
    /// already logged. Read and append happen in one transaction. Returns
    /// the new event id, if any.
    fn append_heartbeat_if(
        &self,
        device_id: &DeviceId,
        now: DateTime<Utc>,
        due: &dyn Fn(Option<DateTime<Utc>>) -> bool,
    ) -> StoreResult<Option<i64>>;

    // Extra-time ledger

    fn insert_extra_time_request(&self, request: &ExtraTimeRecord) -> StoreResult<()>;

    fn get_extra_time(&self, id: &ExtraTimeId) -> StoreResult<Option<ExtraTimeRecord>>;

    /// Most recent pending request for a device
    fn latest_pending_extra_time(&self, device_id: &DeviceId)
    -> StoreResult<Option<ExtraTimeRecord>>;

    /// Approved rows whose `[starts_at, ends_at)` contains `now`
    fn live_extra_time(
        &self,
        device_id: &DeviceId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ExtraTimeRecord>>;

    /// Approve a pending request with a window `[now, now + granted_minutes)`.
    ///
    /// Any approved window for the same device still live at `now` is
    /// clamped to end at `now` in the same transaction.
    fn approve_extra_time(
        &self,
        id: &ExtraTimeId,
        resolved_by: &str,
        granted_minutes: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Resolution>;

    /// Deny a pending request
    fn deny_extra_time(&self, id: &ExtraTimeId, resolved_by: &str) -> StoreResult<Resolution>;

    /// Clamp live windows at `grant.starts_at`, then insert the approved
    /// row, as one transaction
    fn grant_extra_time(&self, grant: &ExtraTimeRecord) -> StoreResult<()>;

    // Parent sessions

    fn register_parent_session(
        &self,
        token: &str,
        parent: &ParentId,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Parent owning an unexpired session token
    fn parent_for_session(&self, token: &str, now: DateTime<Utc>)
    -> StoreResult<Option<ParentId>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
