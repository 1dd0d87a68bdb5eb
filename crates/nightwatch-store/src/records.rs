//! Row types held by the store

use chrono::{DateTime, Utc};
use nightwatch_api::{
    ActionSet, DeviceEventView, DeviceView, ExtraTimeStatus, ExtraTimeView, PolicyView, Schedule,
};
use nightwatch_util::{DeviceId, ExtraTimeId, ParentId};
use std::fmt;

/// Trigger kind of the events written on policy fetch
pub const HEARTBEAT_TRIGGER: &str = "heartbeat";

/// An enrolled device
#[derive(Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub icon: Option<String>,
    /// Non-secret identifier, hex encoded
    pub token: String,
    /// Authentication credential, hex encoded
    pub secret: String,
    pub parent_id: Option<ParentId>,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    pub fn is_owned_by(&self, parent: &ParentId) -> bool {
        self.parent_id.as_ref() == Some(parent)
    }

    pub fn view(&self) -> DeviceView {
        DeviceView {
            device_id: self.id,
            name: self.name.clone(),
            icon: self.icon.clone(),
            parent_id: self.parent_id.clone(),
            created_at: self.created_at,
            last_seen: self.last_seen,
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .field("parent_id", &self.parent_id)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

/// Policy row, one per device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePolicy {
    pub device_id: DeviceId,
    pub actions: ActionSet,
    pub schedule: Schedule,
    /// IANA zone name as entered; resolved (with fallback) at evaluation
    pub timezone: Option<String>,
    pub gap_threshold_minutes: u32,
    pub updated_at: DateTime<Utc>,
}

impl DevicePolicy {
    /// Policy of a freshly enrolled device: nothing enforced, no schedule
    pub fn initial(device_id: DeviceId, gap_threshold_minutes: u32, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            actions: ActionSet::default(),
            schedule: Schedule::Unscheduled,
            timezone: None,
            gap_threshold_minutes,
            updated_at: now,
        }
    }

    pub fn view(&self) -> PolicyView {
        PolicyView {
            device_id: self.device_id,
            actions: self.actions,
            schedule: self.schedule.clone(),
            timezone: self.timezone.clone(),
            gap_threshold_minutes: self.gap_threshold_minutes,
            updated_at: self.updated_at,
        }
    }
}

/// Extra-time ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraTimeRecord {
    pub id: ExtraTimeId,
    pub device_id: DeviceId,
    pub status: ExtraTimeStatus,
    pub requested_minutes: u32,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub granted_minutes: Option<u32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl ExtraTimeRecord {
    /// A new request awaiting a parent decision
    pub fn pending(
        device_id: DeviceId,
        minutes: u32,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExtraTimeId::new(),
            device_id,
            status: ExtraTimeStatus::Pending,
            requested_minutes: minutes,
            reason,
            requested_at: now,
            resolved_by: None,
            granted_minutes: None,
            starts_at: None,
            ends_at: None,
        }
    }

    /// A request approved on creation, live over `[now, now + minutes)`
    pub fn granted(
        device_id: DeviceId,
        minutes: u32,
        reason: Option<String>,
        resolved_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExtraTimeId::new(),
            device_id,
            status: ExtraTimeStatus::Approved,
            requested_minutes: minutes,
            reason,
            requested_at: now,
            resolved_by: Some(resolved_by.into()),
            granted_minutes: Some(minutes),
            starts_at: Some(now),
            ends_at: Some(now + chrono::Duration::minutes(minutes as i64)),
        }
    }

    /// Whether this row is an approved window containing `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match (self.status, self.starts_at, self.ends_at) {
            (ExtraTimeStatus::Approved, Some(start), Some(end)) => start <= now && now < end,
            _ => false,
        }
    }

    pub fn view(&self) -> ExtraTimeView {
        ExtraTimeView {
            id: self.id,
            device_id: self.device_id,
            status: self.status,
            requested_minutes: self.requested_minutes,
            reason: self.reason.clone(),
            requested_at: self.requested_at,
            resolved_by: self.resolved_by.clone(),
            granted_minutes: self.granted_minutes,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}

/// Event to append to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceEvent {
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub shortcut_version: Option<String>,
    pub actions_attempted: Vec<String>,
    pub ok: bool,
    pub errors: Vec<String>,
}

impl NewDeviceEvent {
    pub fn heartbeat(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            timestamp: now,
            trigger: HEARTBEAT_TRIGGER.to_string(),
            shortcut_version: None,
            actions_attempted: Vec::new(),
            ok: true,
            errors: Vec::new(),
        }
    }
}

/// Logged device event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEventRecord {
    pub id: i64,
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub shortcut_version: Option<String>,
    pub actions_attempted: Vec<String>,
    pub ok: bool,
    pub errors: Vec<String>,
}

impl DeviceEventRecord {
    pub fn view(&self) -> DeviceEventView {
        DeviceEventView {
            id: self.id,
            device_id: self.device_id,
            timestamp: self.timestamp,
            trigger: self.trigger.clone(),
            shortcut_version: self.shortcut_version.clone(),
            actions_attempted: self.actions_attempted.clone(),
            ok: self.ok,
            errors: self.errors.clone(),
        }
    }
}
