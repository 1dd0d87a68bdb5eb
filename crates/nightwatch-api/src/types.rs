//! Shared types for the nightwatch API

use chrono::{DateTime, Utc, Weekday};
use nightwatch_util::{DeviceId, ExtraTimeId, ParentId, weekday_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the child device should do while enforcing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(default)]
    pub lock_apps: bool,
    #[serde(default)]
    pub hotspot_off: bool,
    #[serde(default)]
    pub wifi_off: bool,
    #[serde(default)]
    pub mobile_data_off: bool,
    #[serde(default)]
    pub rotate_password: bool,
}

impl ActionSet {
    /// Whether any radio toggle is set.
    ///
    /// `lock_apps` and `rotate_password` describe what to do while
    /// enforcing; they never decide whether to enforce.
    pub fn wants_enforcement(&self) -> bool {
        self.hotspot_off || self.wifi_off || self.mobile_data_off
    }
}

/// A quiet window as entered by a parent. Kept as raw `HH:MM` strings so a
/// malformed stored value degrades at evaluation time instead of failing
/// the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietWindow {
    pub start: String,
    pub end: String,
}

impl QuietWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Quiet-hours configuration of a device.
///
/// Exactly one representation is live: once a per-weekday map is set the
/// legacy single window is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// One optional window per weekday, keyed `mon`..`sun`
    #[serde(rename = "weekly")]
    PerWeekday {
        days: BTreeMap<String, Option<QuietWindow>>,
    },
    /// Single window applied every day
    Legacy(QuietWindow),
    #[default]
    #[serde(rename = "none")]
    Unscheduled,
}

impl Schedule {
    /// The window configured for `weekday`, if any
    pub fn window_for(&self, weekday: Weekday) -> Option<&QuietWindow> {
        match self {
            Schedule::PerWeekday { days } => days.get(weekday_key(weekday)).and_then(Option::as_ref),
            Schedule::Legacy(window) => Some(window),
            Schedule::Unscheduled => None,
        }
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self, Schedule::Unscheduled)
    }
}

/// Resolved window for today, in the device's zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowView {
    pub start: String,
    pub end: String,
    pub tz: String,
}

/// Schedule verdict as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub has_schedule: bool,
    pub in_window: bool,
    pub active_window: Option<WindowView>,
}

/// Lifecycle of an extra-time request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraTimeStatus {
    Pending,
    Approved,
    Denied,
}

impl ExtraTimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtraTimeStatus::Pending => "pending",
            ExtraTimeStatus::Approved => "approved",
            ExtraTimeStatus::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExtraTimeStatus::Pending),
            "approved" => Some(ExtraTimeStatus::Approved),
            "denied" => Some(ExtraTimeStatus::Denied),
            _ => None,
        }
    }
}

/// An extra-time request row as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraTimeView {
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

/// A device event as shown to parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEventView {
    pub id: i64,
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    pub trigger: String,
    pub shortcut_version: Option<String>,
    pub actions_attempted: Vec<String>,
    pub ok: bool,
    pub errors: Vec<String>,
}

/// Device identity as shown to parents. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub device_id: DeviceId,
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<ParentId>,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Stored policy as shown to parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyView {
    pub device_id: DeviceId,
    pub actions: ActionSet,
    pub schedule: Schedule,
    pub timezone: Option<String>,
    pub gap_threshold_minutes: u32,
    pub updated_at: DateTime<Utc>,
}
