//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service settings
    #[serde(default)]
    pub service: RawServiceConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Listen address (default: 127.0.0.1:8787)
    pub listen: Option<String>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// IANA zone used when a device has none, or an unknown one
    pub default_timezone: Option<String>,

    /// Accepted clock skew for signed device requests
    pub signature_skew_seconds: Option<u64>,

    /// Minimum spacing between heartbeat events written on policy fetch
    pub heartbeat_throttle_seconds: Option<u64>,

    /// Expected check-in interval for newly enrolled devices
    pub default_gap_minutes: Option<u32>,

    /// Bearer token granting admin access to the parent surface
    pub admin_token: Option<String>,

    /// Parent notification delivery
    #[serde(default)]
    pub notify: Option<RawNotifyConfig>,
}

/// Push relay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawNotifyConfig {
    /// Endpoint receiving JSON notifications
    pub webhook_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
}
