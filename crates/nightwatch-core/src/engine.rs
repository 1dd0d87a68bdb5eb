//! Policy engine
//!
//! Wires authentication, schedule resolution, the extra-time ledger and
//! the narrator to the store. Every operation takes `now` explicitly; the
//! transport passes the service clock.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use nightwatch_api::{
    API_VERSION, DashboardResponse, DevicePolicyResponse, DeviceSummary, EnrollDevice,
    EnrolledDevice, EventAccepted, EventHistoryResponse, EventReport, ExtraTimeAsk,
    ExtraTimeDecision, ExtraTimeGrant, ExtraTimeView, HealthResponse, PolicyPatch, PolicyView,
};
use nightwatch_config::{
    DEFAULT_GAP_MINUTES, ServiceConfig, ValidationError, check_gap_minutes, normalize_schedule,
    parse_timezone, validate_schedule,
};
use nightwatch_notify::ParentNotification;
use nightwatch_store::{Device, DevicePolicy, ExtraTimeRecord, NewDeviceEvent, Store};
use nightwatch_util::{DeviceId, ExtraTimeId, NightwatchError, ParentId, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    AuthGate, AuthRequest, DEFAULT_SIGNATURE_SKEW, DeviceCredentials, Evaluation,
    ExtraTimeLedger, ScheduleVerdict, StoreLookup, evaluate, heartbeat_due, is_stale, narrate,
    resolve_schedule, tokens_match,
};

/// Default and maximum page size for event history
pub const DEFAULT_EVENT_HISTORY: usize = 50;
pub const MAX_EVENT_HISTORY: usize = 500;

const MAX_NAME_CHARS: usize = 64;
const MAX_TRIGGER_CHARS: usize = 64;

/// Engine tunables, taken from the service configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_timezone: Tz,
    pub signature_skew: Duration,
    pub heartbeat_throttle: Duration,
    pub default_gap_minutes: u32,
    pub admin_token: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timezone: Tz::UTC,
            signature_skew: DEFAULT_SIGNATURE_SKEW,
            heartbeat_throttle: Duration::from_secs(60),
            default_gap_minutes: DEFAULT_GAP_MINUTES,
            admin_token: None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            default_timezone: config.default_timezone,
            signature_skew: config.signature_skew,
            heartbeat_throttle: config.heartbeat_throttle,
            default_gap_minutes: config.default_gap_minutes,
            admin_token: config.admin_token.clone().filter(|t| !t.is_empty()),
        }
    }
}

/// Who is calling the parent surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Admin,
    Parent(ParentId),
}

impl Caller {
    /// Identity recorded on decisions and grants
    pub fn resolved_by(&self) -> String {
        match self {
            Caller::Admin => "admin".to_string(),
            Caller::Parent(parent) => parent.as_str().to_string(),
        }
    }

    pub fn can_access(&self, device: &Device) -> bool {
        match self {
            Caller::Admin => true,
            Caller::Parent(parent) => device.is_owned_by(parent),
        }
    }

    fn owner_filter(&self) -> Option<&ParentId> {
        match self {
            Caller::Admin => None,
            Caller::Parent(parent) => Some(parent),
        }
    }
}

/// Everything derived for one device at one instant
#[derive(Debug, Clone)]
struct DeviceState {
    verdict: ScheduleVerdict,
    evaluation: Evaluation,
    active: Option<ExtraTimeRecord>,
    pending: Option<ExtraTimeRecord>,
    status_message: String,
}

/// The policy engine
pub struct PolicyEngine {
    store: Arc<dyn Store>,
    gate: AuthGate,
    ledger: ExtraTimeLedger,
    settings: EngineSettings,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn Store>, settings: EngineSettings) -> Self {
        info!(
            default_timezone = %settings.default_timezone,
            signature_skew_secs = settings.signature_skew.as_secs(),
            admin_enabled = settings.admin_token.is_some(),
            "Policy engine initialized"
        );

        Self {
            gate: AuthGate::standard(settings.signature_skew),
            ledger: ExtraTimeLedger::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // Device surface

    /// Authenticate an inbound device request
    pub fn authenticate_device(&self, request: &AuthRequest<'_>, now: DateTime<Utc>) -> Result<Device> {
        self.gate
            .authenticate(request, &StoreLookup(self.store.as_ref()), now)
    }

    /// Answer "what should I be doing right now?".
    ///
    /// Also moves last-seen forward and logs a heartbeat event at most once
    /// per throttle interval, judged from the event log itself.
    pub fn device_policy(&self, device: &Device, now: DateTime<Utc>) -> Result<DevicePolicyResponse> {
        self.mark_seen(device, now)?;
        self.record_heartbeat(&device.id, now)?;

        let policy = self.policy_or_initial(&device.id, now)?;
        let state = self.device_state(&policy, now)?;

        debug!(
            device_id = %device.id,
            enforce = state.evaluation.enforce,
            in_window = state.verdict.in_window,
            extra_time = state.active.is_some(),
            "Policy evaluated"
        );

        Ok(DevicePolicyResponse {
            api_version: API_VERSION,
            device_id: device.id,
            server_time: now,
            enforce: state.evaluation.enforce,
            is_quiet_hours: state.evaluation.is_quiet_hours,
            actions: state.evaluation.actions,
            schedule: state.verdict.status(),
            active_extra_time: state.active.as_ref().map(ExtraTimeRecord::view),
            pending_extra_time: state.pending.as_ref().map(ExtraTimeRecord::view),
            status_message: state.status_message,
        })
    }

    /// Move last-seen forward for an authenticated device
    pub fn mark_seen(&self, device: &Device, now: DateTime<Utc>) -> Result<()> {
        Ok(self.store.touch_last_seen(&device.id, now)?)
    }

    /// Append a device-reported event. Timestamps from the future are
    /// pulled back to `now`. Last-seen moves even when the report is
    /// rejected.
    pub fn record_event(
        &self,
        device: &Device,
        report: EventReport,
        now: DateTime<Utc>,
    ) -> Result<EventAccepted> {
        self.mark_seen(device, now)?;

        let trigger = report.trigger.trim();
        if trigger.is_empty() {
            return Err(NightwatchError::validation("trigger", "must not be empty"));
        }
        let trigger: String = trigger.chars().take(MAX_TRIGGER_CHARS).collect();

        let timestamp = report.ts.map_or(now, |ts| ts.min(now));
        let event = NewDeviceEvent {
            device_id: device.id,
            timestamp,
            trigger,
            shortcut_version: report.shortcut_version,
            actions_attempted: report.actions_attempted,
            ok: report.result.ok,
            errors: report.result.errors,
        };

        let event_id = self.store.append_event(&event)?;

        if !event.ok {
            warn!(
                device_id = %device.id,
                trigger = %event.trigger,
                errors = ?event.errors,
                "Device reported failed run"
            );
        } else {
            debug!(device_id = %device.id, event_id, trigger = %event.trigger, "Event recorded");
        }

        Ok(EventAccepted { ok: true, event_id })
    }

    /// Create a pending request and the notification the caller should
    /// dispatch. Delivery is the caller's concern and never affects the
    /// stored request.
    pub fn request_extra_time(
        &self,
        device: &Device,
        ask: ExtraTimeAsk,
        now: DateTime<Utc>,
    ) -> Result<(ExtraTimeView, ParentNotification)> {
        let row = self
            .ledger
            .request_extra_time(device.id, ask.minutes, ask.reason, now)?;

        let notification = ParentNotification::ExtraTimeRequested {
            device_id: device.id,
            device_name: device.name.clone(),
            parent_id: device.parent_id.clone(),
            request_id: row.id,
            minutes: row.requested_minutes,
            reason: row.reason.clone(),
        };

        Ok((row.view(), notification))
    }

    // Parent surface

    /// Resolve parent-surface credentials.
    ///
    /// A bearer equal to the admin token grants admin. Any other bearer, or
    /// the session header, is looked up as a parent session.
    pub fn resolve_caller(
        &self,
        bearer: Option<&str>,
        parent_session: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Caller> {
        if let (Some(admin), Some(bearer)) = (self.settings.admin_token.as_deref(), bearer)
            && tokens_match(admin, bearer)
        {
            return Ok(Caller::Admin);
        }

        let Some(session) = parent_session.or(bearer).filter(|s| !s.is_empty()) else {
            return Err(NightwatchError::Unauthorized);
        };

        match self.store.parent_for_session(session, now)? {
            Some(parent) => Ok(Caller::Parent(parent)),
            None => {
                debug!("Unknown or expired parent session");
                Err(NightwatchError::Unauthorized)
            }
        }
    }

    /// Create a device and its initial policy. The secret is only ever
    /// returned here.
    pub fn enroll_device(
        &self,
        caller: &Caller,
        request: EnrollDevice,
        now: DateTime<Utc>,
    ) -> Result<EnrolledDevice> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(NightwatchError::validation("name", "must not be empty"));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(NightwatchError::validation(
                "name",
                format!("must be at most {} characters", MAX_NAME_CHARS),
            ));
        }

        let parent_id = match caller {
            Caller::Admin => request.parent_id,
            Caller::Parent(parent) => {
                if request.parent_id.as_ref().is_some_and(|p| p != parent) {
                    return Err(NightwatchError::Forbidden);
                }
                Some(parent.clone())
            }
        };

        let credentials = DeviceCredentials::generate();
        let device = Device {
            id: DeviceId::new(),
            name: name.to_string(),
            icon: request.icon.filter(|i| !i.trim().is_empty()),
            token: credentials.token,
            secret: credentials.secret,
            parent_id,
            created_at: now,
            last_seen: None,
        };
        let policy = DevicePolicy::initial(device.id, self.settings.default_gap_minutes, now);
        self.store.insert_device(&device, &policy)?;

        info!(device_id = %device.id, name = %device.name, owner = ?device.parent_id, "Device enrolled");

        Ok(EnrolledDevice {
            device: device.view(),
            device_token: device.token.clone(),
            device_secret: device.secret.clone(),
        })
    }

    pub fn delete_device(&self, caller: &Caller, device_id: &DeviceId) -> Result<()> {
        let device = self.visible_device(caller, device_id)?;
        if !self.store.delete_device(&device.id)? {
            return Err(NightwatchError::not_found("device"));
        }
        info!(device_id = %device.id, by = %caller.resolved_by(), "Device deleted");
        Ok(())
    }

    pub fn get_policy(
        &self,
        caller: &Caller,
        device_id: &DeviceId,
        now: DateTime<Utc>,
    ) -> Result<PolicyView> {
        let device = self.visible_device(caller, device_id)?;
        Ok(self.policy_or_initial(&device.id, now)?.view())
    }

    /// Apply any subset of policy fields.
    ///
    /// The whole patch is validated before anything is written. A weekly
    /// schedule replaces the legacy window outright.
    pub fn patch_policy(
        &self,
        caller: &Caller,
        device_id: &DeviceId,
        patch: PolicyPatch,
        now: DateTime<Utc>,
    ) -> Result<PolicyView> {
        let device = self.visible_device(caller, device_id)?;
        let mut policy = self.policy_or_initial(&device.id, now)?;

        if let Some(schedule) = patch.schedule {
            if let Some(error) = validate_schedule(&schedule).into_iter().next() {
                return Err(validation_error(error));
            }
            policy.schedule = normalize_schedule(schedule);
        }

        if let Some(timezone) = patch.timezone {
            let timezone = timezone.trim();
            policy.timezone = if timezone.is_empty() {
                None
            } else {
                parse_timezone("timezone", timezone).map_err(validation_error)?;
                Some(timezone.to_string())
            };
        }

        if let Some(gap) = patch.gap_threshold_minutes {
            policy.gap_threshold_minutes =
                check_gap_minutes("gap_threshold_minutes", gap).map_err(validation_error)?;
        }

        let actions = &mut policy.actions;
        if let Some(v) = patch.lock_apps {
            actions.lock_apps = v;
        }
        if let Some(v) = patch.hotspot_off {
            actions.hotspot_off = v;
        }
        if let Some(v) = patch.wifi_off {
            actions.wifi_off = v;
        }
        if let Some(v) = patch.mobile_data_off {
            actions.mobile_data_off = v;
        }
        if let Some(v) = patch.rotate_password {
            actions.rotate_password = v;
        }

        policy.updated_at = now;
        self.store.save_policy(&policy)?;

        info!(
            device_id = %device.id,
            by = %caller.resolved_by(),
            wants_enforcement = policy.actions.wants_enforcement(),
            scheduled = !policy.schedule.is_unscheduled(),
            "Policy updated"
        );
        Ok(policy.view())
    }

    /// Approve or deny a pending extra-time request
    pub fn decide_extra_time(
        &self,
        caller: &Caller,
        request_id: &ExtraTimeId,
        decision: ExtraTimeDecision,
        now: DateTime<Utc>,
    ) -> Result<ExtraTimeView> {
        let request = self
            .store
            .get_extra_time(request_id)?
            .ok_or_else(|| NightwatchError::not_found("extra time request"))?;
        self.visible_device(caller, &request.device_id)?;

        let row = self.ledger.decide(
            request_id,
            decision.approve,
            decision.granted_minutes,
            &caller.resolved_by(),
            now,
        )?;
        Ok(row.view())
    }

    /// Grant extra time without a request. Zero minutes cancels any active
    /// window.
    pub fn grant_extra_time(
        &self,
        caller: &Caller,
        device_id: &DeviceId,
        grant: ExtraTimeGrant,
        now: DateTime<Utc>,
    ) -> Result<ExtraTimeView> {
        let device = self.visible_device(caller, device_id)?;
        let row = self.ledger.grant_direct(
            device.id,
            grant.minutes,
            grant.reason,
            &caller.resolved_by(),
            now,
        )?;
        Ok(row.view())
    }

    /// Current state of every device visible to the caller
    pub fn dashboard(&self, caller: &Caller, now: DateTime<Utc>) -> Result<DashboardResponse> {
        let devices = self.store.list_devices(caller.owner_filter())?;

        let mut summaries = Vec::with_capacity(devices.len());
        for device in devices {
            summaries.push(self.summarize(&device, now)?);
        }

        Ok(DashboardResponse {
            generated_at: now,
            devices: summaries,
        })
    }

    /// Most recent events for one device, newest first
    pub fn event_history(
        &self,
        caller: &Caller,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> Result<EventHistoryResponse> {
        let device = self.visible_device(caller, device_id)?;
        let limit = limit
            .unwrap_or(DEFAULT_EVENT_HISTORY)
            .clamp(1, MAX_EVENT_HISTORY);

        let events = self
            .store
            .recent_events(&device.id, limit)?
            .iter()
            .map(|e| e.view())
            .collect();

        Ok(EventHistoryResponse {
            device_id: device.id,
            events,
        })
    }

    pub fn health(&self) -> HealthResponse {
        let store_healthy = self.store.is_healthy();
        HealthResponse {
            status: if store_healthy { "ok" } else { "degraded" }.to_string(),
            api_version: API_VERSION,
            store_healthy,
        }
    }

    // Internals

    /// Device visible to the caller. Devices owned by someone else are
    /// reported as missing.
    fn visible_device(&self, caller: &Caller, device_id: &DeviceId) -> Result<Device> {
        match self.store.get_device(device_id)? {
            Some(device) if caller.can_access(&device) => Ok(device),
            Some(_) => {
                debug!(device_id = %device_id, caller = ?caller, "Device not visible to caller");
                Err(NightwatchError::not_found("device"))
            }
            None => Err(NightwatchError::not_found("device")),
        }
    }

    fn policy_or_initial(&self, device_id: &DeviceId, now: DateTime<Utc>) -> Result<DevicePolicy> {
        match self.store.get_policy(device_id)? {
            Some(policy) => Ok(policy),
            None => {
                warn!(device_id = %device_id, "Policy row missing, using defaults");
                Ok(DevicePolicy::initial(
                    *device_id,
                    self.settings.default_gap_minutes,
                    now,
                ))
            }
        }
    }

    fn record_heartbeat(&self, device_id: &DeviceId, now: DateTime<Utc>) -> Result<()> {
        let throttle = to_chrono(self.settings.heartbeat_throttle);
        self.store
            .append_heartbeat_if(device_id, now, &|last| heartbeat_due(last, throttle, now))?;
        Ok(())
    }

    fn device_state(&self, policy: &DevicePolicy, now: DateTime<Utc>) -> Result<DeviceState> {
        let verdict = resolve_schedule(
            &policy.schedule,
            policy.timezone.as_deref(),
            self.settings.default_timezone,
            now,
        );
        let active = self.ledger.active_window_for(&policy.device_id, now)?;
        let pending = self.ledger.pending_for(&policy.device_id)?;

        let evaluation = evaluate(&policy.actions, &verdict, active.as_ref());
        let status_message = narrate(&verdict, &evaluation, active.as_ref(), pending.as_ref());

        Ok(DeviceState {
            verdict,
            evaluation,
            active,
            pending,
            status_message,
        })
    }

    fn summarize(&self, device: &Device, now: DateTime<Utc>) -> Result<DeviceSummary> {
        let policy = self.policy_or_initial(&device.id, now)?;
        let state = self.device_state(&policy, now)?;
        let last_event_at = self.store.latest_event_at(&device.id)?;

        let gap = chrono::Duration::minutes(policy.gap_threshold_minutes as i64);
        let stale = is_stale(state.evaluation.enforce, last_event_at, gap, now);
        if stale {
            warn!(device_id = %device.id, last_event_at = ?last_event_at, "Device check-in overdue");
        }

        Ok(DeviceSummary {
            device: device.view(),
            enforce: state.evaluation.enforce,
            status_message: state.status_message,
            last_event_at,
            stale,
            active_extra_time: state.active.as_ref().map(ExtraTimeRecord::view),
            pending_extra_time: state.pending.as_ref().map(ExtraTimeRecord::view),
        })
    }
}

fn validation_error(error: ValidationError) -> NightwatchError {
    NightwatchError::validation(error.field().to_string(), error.to_string())
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::seconds(duration.as_secs() as i64)
}
