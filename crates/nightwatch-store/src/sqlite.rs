//! SQLite-based store implementation
//!
//! All instants are stored as integer milliseconds since the Unix epoch so
//! window comparisons happen in SQL without string collation surprises.

use chrono::{DateTime, Utc};
use nightwatch_api::{ActionSet, ExtraTimeStatus, QuietWindow, Schedule};
use nightwatch_util::{DeviceId, ExtraTimeId, ParentId};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    Device, DeviceEventRecord, DevicePolicy, ExtraTimeRecord, HEARTBEAT_TRIGGER, NewDeviceEvent,
    Resolution, Store, StoreError, StoreResult,
};

const DEVICE_COLUMNS: &str =
    "id, name, icon, token, secret, parent_id, created_at_ms, last_seen_ms";

const POLICY_COLUMNS: &str = "device_id, lock_apps, hotspot_off, wifi_off, mobile_data_off, \
     rotate_password, quiet_start, quiet_end, weekly_json, timezone, gap_threshold_minutes, \
     updated_at_ms";

const EVENT_COLUMNS: &str = "id, device_id, timestamp_ms, trigger_kind, shortcut_version, \
     actions_attempted_json, ok, errors_json";

const EXTRA_TIME_COLUMNS: &str = "id, device_id, status, requested_minutes, reason, \
     requested_at_ms, resolved_by, granted_minutes, starts_at_ms, ends_at_ms";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                icon TEXT,
                token TEXT NOT NULL UNIQUE,
                secret TEXT NOT NULL UNIQUE,
                parent_id TEXT,
                created_at_ms INTEGER NOT NULL,
                last_seen_ms INTEGER
            );

            -- One row per device; a weekly map clears the legacy columns
            CREATE TABLE IF NOT EXISTS policies (
                device_id TEXT PRIMARY KEY REFERENCES devices(id) ON DELETE CASCADE,
                lock_apps INTEGER NOT NULL DEFAULT 0,
                hotspot_off INTEGER NOT NULL DEFAULT 0,
                wifi_off INTEGER NOT NULL DEFAULT 0,
                mobile_data_off INTEGER NOT NULL DEFAULT 0,
                rotate_password INTEGER NOT NULL DEFAULT 0,
                quiet_start TEXT,
                quiet_end TEXT,
                weekly_json TEXT,
                timezone TEXT,
                gap_threshold_minutes INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            -- Append-only
            CREATE TABLE IF NOT EXISTS device_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                timestamp_ms INTEGER NOT NULL,
                trigger_kind TEXT NOT NULL,
                shortcut_version TEXT,
                actions_attempted_json TEXT NOT NULL,
                ok INTEGER NOT NULL,
                errors_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS extra_time_requests (
                id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'denied')),
                requested_minutes INTEGER NOT NULL,
                reason TEXT,
                requested_at_ms INTEGER NOT NULL,
                resolved_by TEXT,
                granted_minutes INTEGER,
                starts_at_ms INTEGER,
                ends_at_ms INTEGER
            );

            CREATE TABLE IF NOT EXISTS parent_sessions (
                token TEXT PRIMARY KEY,
                parent_id TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_devices_parent ON devices(parent_id);
            CREATE INDEX IF NOT EXISTS idx_events_device_time
                ON device_events(device_id, timestamp_ms);
            CREATE INDEX IF NOT EXISTS idx_extra_time_device_status
                ON extra_time_requests(device_id, status);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

enum Decision {
    Approve { granted_minutes: u32, now: DateTime<Utc> },
    Deny,
}

impl SqliteStore {
    fn resolve_pending(
        &self,
        id: &ExtraTimeId,
        resolved_by: &str,
        decision: Decision,
    ) -> StoreResult<Resolution> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(existing) = select_extra_time(&tx, id)? else {
            return Ok(Resolution::NotFound);
        };
        if existing.status != ExtraTimeStatus::Pending {
            return Ok(Resolution::AlreadyResolved(existing));
        }

        match decision {
            Decision::Approve {
                granted_minutes,
                now,
            } => {
                let now_ms = to_ms(now);
                let clamped = clamp_live_windows(&tx, &existing.device_id, now_ms)?;
                tx.execute(
                    r#"
                    UPDATE extra_time_requests
                    SET status = 'approved', resolved_by = ?2, granted_minutes = ?3,
                        starts_at_ms = ?4, ends_at_ms = ?5
                    WHERE id = ?1 AND status = 'pending'
                    "#,
                    params![
                        id.to_string(),
                        resolved_by,
                        granted_minutes,
                        now_ms,
                        now_ms + minutes_to_ms(granted_minutes),
                    ],
                )?;
                debug!(request_id = %id, granted_minutes, clamped, "Extra time approved");
            }
            Decision::Deny => {
                tx.execute(
                    r#"
                    UPDATE extra_time_requests
                    SET status = 'denied', resolved_by = ?2
                    WHERE id = ?1 AND status = 'pending'
                    "#,
                    params![id.to_string(), resolved_by],
                )?;
                debug!(request_id = %id, "Extra time denied");
            }
        }

        let updated = select_extra_time(&tx, id)?
            .ok_or_else(|| StoreError::Database(format!("extra time {} vanished", id)))?;
        tx.commit()?;
        Ok(Resolution::Resolved(updated))
    }
}

impl Store for SqliteStore {
    fn insert_device(&self, device: &Device, policy: &DevicePolicy) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO devices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                DEVICE_COLUMNS
            ),
            params![
                device.id.to_string(),
                device.name,
                device.icon,
                device.token,
                device.secret,
                device.parent_id.as_ref().map(|p| p.as_str()),
                to_ms(device.created_at),
                device.last_seen.map(to_ms),
            ],
        )?;
        upsert_policy(&tx, policy)?;
        tx.commit()?;

        debug!(device_id = %device.id, "Device inserted");
        Ok(())
    }

    fn get_device(&self, id: &DeviceId) -> StoreResult<Option<Device>> {
        let conn = self.lock()?;
        let device = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS),
                [id.to_string()],
                device_from_row,
            )
            .optional()?;
        Ok(device)
    }

    fn find_device_by_token(&self, token: &str) -> StoreResult<Option<Device>> {
        let conn = self.lock()?;
        let device = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE token = ?1", DEVICE_COLUMNS),
                [token],
                device_from_row,
            )
            .optional()?;
        Ok(device)
    }

    fn find_device_by_secret(&self, secret: &str) -> StoreResult<Option<Device>> {
        let conn = self.lock()?;
        let device = conn
            .query_row(
                &format!("SELECT {} FROM devices WHERE secret = ?1", DEVICE_COLUMNS),
                [secret],
                device_from_row,
            )
            .optional()?;
        Ok(device)
    }

    fn list_devices(&self, owner: Option<&ParentId>) -> StoreResult<Vec<Device>> {
        let conn = self.lock()?;

        let devices = match owner {
            Some(parent) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM devices WHERE parent_id = ?1 ORDER BY created_at_ms, name",
                    DEVICE_COLUMNS
                ))?;
                stmt.query_map([parent.as_str()], device_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM devices ORDER BY created_at_ms, name",
                    DEVICE_COLUMNS
                ))?;
                stmt.query_map([], device_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(devices)
    }

    fn delete_device(&self, id: &DeviceId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM devices WHERE id = ?1", [id.to_string()])?;
        debug!(device_id = %id, removed, "Device delete");
        Ok(removed > 0)
    }

    fn touch_last_seen(&self, id: &DeviceId, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            UPDATE devices
            SET last_seen_ms = MAX(COALESCE(last_seen_ms, ?2), ?2)
            WHERE id = ?1
            "#,
            params![id.to_string(), to_ms(at)],
        )?;
        Ok(())
    }

    fn get_policy(&self, device_id: &DeviceId) -> StoreResult<Option<DevicePolicy>> {
        let conn = self.lock()?;
        let policy = conn
            .query_row(
                &format!("SELECT {} FROM policies WHERE device_id = ?1", POLICY_COLUMNS),
                [device_id.to_string()],
                policy_from_row,
            )
            .optional()?;
        Ok(policy)
    }

    fn save_policy(&self, policy: &DevicePolicy) -> StoreResult<()> {
        let conn = self.lock()?;
        upsert_policy(&conn, policy)?;
        debug!(device_id = %policy.device_id, "Policy saved");
        Ok(())
    }

    fn append_event(&self, event: &NewDeviceEvent) -> StoreResult<i64> {
        let conn = self.lock()?;
        let id = insert_event(&conn, event)?;
        debug!(event_id = id, device_id = %event.device_id, trigger = %event.trigger, "Device event appended");
        Ok(id)
    }

    fn recent_events(
        &self,
        device_id: &DeviceId,
        limit: usize,
    ) -> StoreResult<Vec<DeviceEventRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM device_events WHERE device_id = ?1 \
             ORDER BY timestamp_ms DESC, id DESC LIMIT ?2",
            EVENT_COLUMNS
        ))?;

        let events = stmt
            .query_map(params![device_id.to_string(), limit as i64], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn latest_event_at(&self, device_id: &DeviceId) -> StoreResult<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let ms: Option<i64> = conn.query_row(
            "SELECT MAX(timestamp_ms) FROM device_events WHERE device_id = ?1",
            [device_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(ms.map(from_ms))
    }

    fn append_heartbeat_if(
        &self,
        device_id: &DeviceId,
        now: DateTime<Utc>,
        due: &dyn Fn(Option<DateTime<Utc>>) -> bool,
    ) -> StoreResult<Option<i64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last_ms: Option<i64> = tx.query_row(
            "SELECT MAX(timestamp_ms) FROM device_events WHERE device_id = ?1 AND trigger_kind = ?2",
            params![device_id.to_string(), HEARTBEAT_TRIGGER],
            |row| row.get(0),
        )?;
        if !due(last_ms.map(from_ms)) {
            return Ok(None);
        }

        let id = insert_event(&tx, &NewDeviceEvent::heartbeat(*device_id, now))?;
        tx.commit()?;

        debug!(event_id = id, device_id = %device_id, "Heartbeat logged");
        Ok(Some(id))
    }

    fn insert_extra_time_request(&self, request: &ExtraTimeRecord) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_extra_time(&conn, request)?;
        debug!(request_id = %request.id, device_id = %request.device_id, "Extra time request stored");
        Ok(())
    }

    fn get_extra_time(&self, id: &ExtraTimeId) -> StoreResult<Option<ExtraTimeRecord>> {
        let conn = self.lock()?;
        Ok(select_extra_time(&conn, id)?)
    }

    fn latest_pending_extra_time(
        &self,
        device_id: &DeviceId,
    ) -> StoreResult<Option<ExtraTimeRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM extra_time_requests \
                     WHERE device_id = ?1 AND status = 'pending' \
                     ORDER BY requested_at_ms DESC, rowid DESC LIMIT 1",
                    EXTRA_TIME_COLUMNS
                ),
                [device_id.to_string()],
                extra_time_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn live_extra_time(
        &self,
        device_id: &DeviceId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ExtraTimeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM extra_time_requests \
             WHERE device_id = ?1 AND status = 'approved' \
               AND starts_at_ms <= ?2 AND ends_at_ms > ?2 \
             ORDER BY starts_at_ms DESC, ends_at_ms DESC",
            EXTRA_TIME_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![device_id.to_string(), to_ms(now)], extra_time_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn approve_extra_time(
        &self,
        id: &ExtraTimeId,
        resolved_by: &str,
        granted_minutes: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Resolution> {
        self.resolve_pending(
            id,
            resolved_by,
            Decision::Approve {
                granted_minutes,
                now,
            },
        )
    }

    fn deny_extra_time(&self, id: &ExtraTimeId, resolved_by: &str) -> StoreResult<Resolution> {
        self.resolve_pending(id, resolved_by, Decision::Deny)
    }

    fn grant_extra_time(&self, grant: &ExtraTimeRecord) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = grant.starts_at.unwrap_or(grant.requested_at);
        let clamped = clamp_live_windows(&tx, &grant.device_id, to_ms(now))?;
        insert_extra_time(&tx, grant)?;
        tx.commit()?;

        debug!(
            request_id = %grant.id,
            device_id = %grant.device_id,
            granted_minutes = ?grant.granted_minutes,
            clamped,
            "Extra time granted"
        );
        Ok(())
    }

    fn register_parent_session(
        &self,
        token: &str,
        parent: &ParentId,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO parent_sessions (token, parent_id, created_at_ms, expires_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(token)
            DO UPDATE SET parent_id = excluded.parent_id,
                          created_at_ms = excluded.created_at_ms,
                          expires_at_ms = excluded.expires_at_ms
            "#,
            params![token, parent.as_str(), to_ms(now), expires_at.map(to_ms)],
        )?;
        debug!(parent_id = %parent, "Parent session registered");
        Ok(())
    }

    fn parent_for_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ParentId>> {
        let conn = self.lock()?;
        let parent: Option<String> = conn
            .query_row(
                r#"
                SELECT parent_id FROM parent_sessions
                WHERE token = ?1 AND (expires_at_ms IS NULL OR expires_at_ms > ?2)
                "#,
                params![token, to_ms(now)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parent.map(ParentId::from))
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn minutes_to_ms(minutes: u32) -> i64 {
    minutes as i64 * 60_000
}

fn insert_event(conn: &Connection, event: &NewDeviceEvent) -> StoreResult<i64> {
    conn.execute(
        r#"
        INSERT INTO device_events
            (device_id, timestamp_ms, trigger_kind, shortcut_version,
             actions_attempted_json, ok, errors_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            event.device_id.to_string(),
            to_ms(event.timestamp),
            event.trigger,
            event.shortcut_version,
            serde_json::to_string(&event.actions_attempted)?,
            event.ok,
            serde_json::to_string(&event.errors)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Truncate approved windows still live at `now_ms` so they end at `now_ms`
fn clamp_live_windows(
    conn: &Connection,
    device_id: &DeviceId,
    now_ms: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        UPDATE extra_time_requests
        SET ends_at_ms = ?2
        WHERE device_id = ?1 AND status = 'approved'
          AND starts_at_ms <= ?2 AND ends_at_ms > ?2
        "#,
        params![device_id.to_string(), now_ms],
    )
}

fn insert_extra_time(conn: &Connection, row: &ExtraTimeRecord) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO extra_time_requests ({}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            EXTRA_TIME_COLUMNS
        ),
        params![
            row.id.to_string(),
            row.device_id.to_string(),
            row.status.as_str(),
            row.requested_minutes,
            row.reason,
            to_ms(row.requested_at),
            row.resolved_by,
            row.granted_minutes,
            row.starts_at.map(to_ms),
            row.ends_at.map(to_ms),
        ],
    )
}

fn select_extra_time(
    conn: &Connection,
    id: &ExtraTimeId,
) -> rusqlite::Result<Option<ExtraTimeRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM extra_time_requests WHERE id = ?1",
            EXTRA_TIME_COLUMNS
        ),
        [id.to_string()],
        extra_time_from_row,
    )
    .optional()
}

fn upsert_policy(conn: &Connection, policy: &DevicePolicy) -> StoreResult<()> {
    let (quiet_start, quiet_end, weekly_json) = encode_schedule(&policy.schedule)?;
    let actions = &policy.actions;

    conn.execute(
        &format!(
            "INSERT INTO policies ({}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(device_id) DO UPDATE SET \
                lock_apps = excluded.lock_apps, \
                hotspot_off = excluded.hotspot_off, \
                wifi_off = excluded.wifi_off, \
                mobile_data_off = excluded.mobile_data_off, \
                rotate_password = excluded.rotate_password, \
                quiet_start = excluded.quiet_start, \
                quiet_end = excluded.quiet_end, \
                weekly_json = excluded.weekly_json, \
                timezone = excluded.timezone, \
                gap_threshold_minutes = excluded.gap_threshold_minutes, \
                updated_at_ms = excluded.updated_at_ms",
            POLICY_COLUMNS
        ),
        params![
            policy.device_id.to_string(),
            actions.lock_apps,
            actions.hotspot_off,
            actions.wifi_off,
            actions.mobile_data_off,
            actions.rotate_password,
            quiet_start,
            quiet_end,
            weekly_json,
            policy.timezone,
            policy.gap_threshold_minutes,
            to_ms(policy.updated_at),
        ],
    )?;
    Ok(())
}

type ScheduleColumns = (Option<String>, Option<String>, Option<String>);

fn encode_schedule(schedule: &Schedule) -> StoreResult<ScheduleColumns> {
    Ok(match schedule {
        Schedule::PerWeekday { days } => (None, None, Some(serde_json::to_string(days)?)),
        Schedule::Legacy(window) => (Some(window.start.clone()), Some(window.end.clone()), None),
        Schedule::Unscheduled => (None, None, None),
    })
}

/// Rebuild the schedule from its columns. An unreadable weekly map is
/// treated as no schedule rather than failing the row.
fn decode_schedule(
    device_id: &DeviceId,
    quiet_start: Option<String>,
    quiet_end: Option<String>,
    weekly_json: Option<String>,
) -> Schedule {
    if let Some(json) = weekly_json {
        return match serde_json::from_str::<BTreeMap<String, Option<QuietWindow>>>(&json) {
            Ok(days) => Schedule::PerWeekday { days },
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Stored weekly schedule unreadable");
                Schedule::Unscheduled
            }
        };
    }

    match (quiet_start, quiet_end) {
        (Some(start), Some(end)) => Schedule::Legacy(QuietWindow { start, end }),
        _ => Schedule::Unscheduled,
    }
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: parse_col(row, 0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        token: row.get(3)?,
        secret: row.get(4)?,
        parent_id: row.get::<_, Option<String>>(5)?.map(ParentId::from),
        created_at: from_ms(row.get(6)?),
        last_seen: row.get::<_, Option<i64>>(7)?.map(from_ms),
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<DevicePolicy> {
    let device_id: DeviceId = parse_col(row, 0)?;
    let schedule = decode_schedule(&device_id, row.get(6)?, row.get(7)?, row.get(8)?);

    Ok(DevicePolicy {
        device_id,
        actions: ActionSet {
            lock_apps: row.get(1)?,
            hotspot_off: row.get(2)?,
            wifi_off: row.get(3)?,
            mobile_data_off: row.get(4)?,
            rotate_password: row.get(5)?,
        },
        schedule,
        timezone: row.get(9)?,
        gap_threshold_minutes: row.get(10)?,
        updated_at: from_ms(row.get(11)?),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceEventRecord> {
    Ok(DeviceEventRecord {
        id: row.get(0)?,
        device_id: parse_col(row, 1)?,
        timestamp: from_ms(row.get(2)?),
        trigger: row.get(3)?,
        shortcut_version: row.get(4)?,
        actions_attempted: json_col(row, 5)?,
        ok: row.get(6)?,
        errors: json_col(row, 7)?,
    })
}

fn extra_time_from_row(row: &Row<'_>) -> rusqlite::Result<ExtraTimeRecord> {
    let status_raw: String = row.get(2)?;
    let status = ExtraTimeStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown extra time status '{}'", status_raw).into(),
        )
    })?;

    Ok(ExtraTimeRecord {
        id: parse_col(row, 0)?,
        device_id: parse_col(row, 1)?,
        status,
        requested_minutes: row.get(3)?,
        reason: row.get(4)?,
        requested_at: from_ms(row.get(5)?),
        resolved_by: row.get(6)?,
        granted_minutes: row.get(7)?,
        starts_at: row.get::<_, Option<i64>>(8)?.map(from_ms),
        ends_at: row.get::<_, Option<i64>>(9)?.map(from_ms),
    })
}
