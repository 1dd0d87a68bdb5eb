//! Validated service settings

use crate::schema::{RawConfig, RawNotifyConfig, RawServiceConfig};
use chrono_tz::Tz;
use nightwatch_util::default_data_dir;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTEN_PORT: u16 = 8787;
pub const DEFAULT_SIGNATURE_SKEW_SECONDS: u64 = 300;
pub const DEFAULT_HEARTBEAT_THROTTLE_SECONDS: u64 = 60;
pub const DEFAULT_GAP_MINUTES: u32 = 30;
pub const DEFAULT_NOTIFY_TIMEOUT_SECONDS: u64 = 5;

/// Validated configuration ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub data_dir: PathBuf,
    /// Zone used when a device has none, or one that does not resolve
    pub default_timezone: Tz,
    pub signature_skew: Duration,
    pub heartbeat_throttle: Duration,
    pub default_gap_minutes: u32,
    pub admin_token: Option<String>,
    pub notify: Option<NotifyConfig>,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();

        Self {
            listen: raw
                .listen
                .and_then(|l| l.parse().ok())
                .unwrap_or(defaults.listen),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            default_timezone: raw
                .default_timezone
                .and_then(|tz| tz.trim().parse().ok())
                .unwrap_or(defaults.default_timezone),
            signature_skew: raw
                .signature_skew_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.signature_skew),
            heartbeat_throttle: raw
                .heartbeat_throttle_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_throttle),
            default_gap_minutes: raw
                .default_gap_minutes
                .unwrap_or(defaults.default_gap_minutes),
            admin_token: raw.admin_token.map(|t| t.trim().to_string()),
            notify: raw.notify.map(NotifyConfig::from_raw),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_LISTEN_PORT)),
            data_dir: default_data_dir(),
            default_timezone: Tz::UTC,
            signature_skew: Duration::from_secs(DEFAULT_SIGNATURE_SKEW_SECONDS),
            heartbeat_throttle: Duration::from_secs(DEFAULT_HEARTBEAT_THROTTLE_SECONDS),
            default_gap_minutes: DEFAULT_GAP_MINUTES,
            admin_token: None,
            notify: None,
        }
    }
}

/// Push relay configuration
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: String,
    pub timeout: Duration,
}

impl NotifyConfig {
    fn from_raw(raw: RawNotifyConfig) -> Self {
        Self {
            webhook_url: raw.webhook_url,
            timeout: Duration::from_secs(
                raw.timeout_seconds.unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECONDS),
            ),
        }
    }
}
