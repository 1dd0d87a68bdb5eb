//! Request bodies for the nightwatch API

use chrono::{DateTime, Utc};
use nightwatch_util::ParentId;
use serde::{Deserialize, Serialize};

use crate::Schedule;

/// Report posted by the device automation after it ran
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReport {
    /// Device-side timestamp; the server time is used when absent
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    pub trigger: String,
    #[serde(default)]
    pub shortcut_version: Option<String>,
    #[serde(default)]
    pub actions_attempted: Vec<String>,
    pub result: EventOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventOutcome {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Child asks for extra time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTimeAsk {
    pub minutes: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parent approves or denies a pending request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTimeDecision {
    pub approve: bool,
    /// Overrides the requested minutes when approving
    #[serde(default)]
    pub granted_minutes: Option<i64>,
}

/// Parent grants extra time directly. Zero minutes cancels any active
/// extra time immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTimeGrant {
    pub minutes: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Partial policy update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyPatch {
    #[serde(default)]
    pub lock_apps: Option<bool>,
    #[serde(default)]
    pub hotspot_off: Option<bool>,
    #[serde(default)]
    pub wifi_off: Option<bool>,
    #[serde(default)]
    pub mobile_data_off: Option<bool>,
    #[serde(default)]
    pub rotate_password: Option<bool>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub gap_threshold_minutes: Option<i64>,
}

/// Enroll a new device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollDevice {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Owner when enrolled by an admin; ignored for parent callers
    #[serde(default)]
    pub parent_id: Option<ParentId>,
}
