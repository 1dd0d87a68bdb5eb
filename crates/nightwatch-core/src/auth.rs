//! Device authentication
//!
//! An [`AuthGate`] holds an ordered list of [`Authenticator`]s. Each one
//! either recognizes its own headers and decides, or steps aside. A scheme
//! that recognizes the request and rejects it ends the chain: a bad bearer
//! never falls through to a weaker scheme.
//!
//! Every failure reaches the caller as the same `Unauthorized`; the
//! internal reason only goes to the debug log.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use nightwatch_store::{Device, Store};
use nightwatch_util::{NightwatchError, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const DEVICE_TOKEN_HEADER: &str = "x-device-token";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Default accepted distance between a signed timestamp and server time
pub const DEFAULT_SIGNATURE_SKEW: Duration = Duration::from_secs(300);

const DEVICE_TOKEN_BYTES: usize = 16;
const DEVICE_SECRET_BYTES: usize = 32;

/// Read access to request headers, case-insensitive by name
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The parts of an inbound request that authentication looks at
pub struct AuthRequest<'a> {
    pub method: &'a str,
    /// Path without the query string
    pub path: &'a str,
    pub body: &'a [u8],
    pub headers: &'a dyn HeaderSource,
}

/// How authenticators find devices
pub trait DeviceLookup {
    fn device_by_secret(&self, secret: &str) -> Result<Option<Device>>;
    fn device_by_token(&self, token: &str) -> Result<Option<Device>>;
}

/// Device lookup backed by the store
pub struct StoreLookup<'a>(pub &'a dyn Store);

impl DeviceLookup for StoreLookup<'_> {
    fn device_by_secret(&self, secret: &str) -> Result<Option<Device>> {
        Ok(self.0.find_device_by_secret(secret)?)
    }

    fn device_by_token(&self, token: &str) -> Result<Option<Device>> {
        Ok(self.0.find_device_by_token(token)?)
    }
}

/// Result of one authentication scheme
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(Device),
    /// The scheme's headers are absent
    NotApplicable,
    /// The scheme applied and the request failed it
    Rejected(&'static str),
}

pub trait Authenticator: Send + Sync {
    fn name(&self) -> &'static str;

    fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        lookup: &dyn DeviceLookup,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome>;
}

/// `Authorization: Bearer <secret>`, optionally pinned by `X-Device-Token`
pub struct BearerAuthenticator;

impl Authenticator for BearerAuthenticator {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        lookup: &dyn DeviceLookup,
        _now: DateTime<Utc>,
    ) -> Result<AuthOutcome> {
        let Some(secret) = request
            .headers
            .header(AUTHORIZATION_HEADER)
            .and_then(bearer_value)
        else {
            return Ok(AuthOutcome::NotApplicable);
        };
        if secret.is_empty() {
            return Ok(AuthOutcome::Rejected("empty bearer"));
        }

        let Some(device) = lookup.device_by_secret(secret)? else {
            return Ok(AuthOutcome::Rejected("unknown secret"));
        };
        if !constant_time_eq(device.secret.as_bytes(), secret.as_bytes()) {
            return Ok(AuthOutcome::Rejected("secret mismatch"));
        }

        if let Some(token) = request.headers.header(DEVICE_TOKEN_HEADER)
            && !constant_time_eq(device.token.as_bytes(), token.trim().as_bytes())
        {
            return Ok(AuthOutcome::Rejected("device token does not match secret"));
        }

        Ok(AuthOutcome::Authenticated(device))
    }
}

/// Legacy clients: `X-Device-Token`, `X-Timestamp`, `X-Signature`
pub struct SignedRequestAuthenticator {
    skew: Duration,
}

impl SignedRequestAuthenticator {
    pub fn new(skew: Duration) -> Self {
        Self { skew }
    }
}

impl Authenticator for SignedRequestAuthenticator {
    fn name(&self) -> &'static str {
        "signed-timestamp"
    }

    fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        lookup: &dyn DeviceLookup,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome> {
        let headers = request.headers;
        let (Some(token), Some(timestamp), Some(signature)) = (
            headers.header(DEVICE_TOKEN_HEADER),
            headers.header(TIMESTAMP_HEADER),
            headers.header(SIGNATURE_HEADER),
        ) else {
            return Ok(AuthOutcome::NotApplicable);
        };
        let token = token.trim();

        if hex::decode(token).is_err() {
            return Ok(AuthOutcome::Rejected("device token is not hex"));
        }

        let Some(signed_at) = parse_timestamp(timestamp) else {
            return Ok(AuthOutcome::Rejected("unparsable timestamp"));
        };
        let drift_ms = (now - signed_at).num_milliseconds().unsigned_abs();
        if drift_ms > self.skew.as_millis() as u64 {
            return Ok(AuthOutcome::Rejected("timestamp outside allowed skew"));
        }

        let Some(device) = lookup.device_by_token(token)? else {
            return Ok(AuthOutcome::Rejected("unknown device token"));
        };

        let Ok(provided) = hex::decode(signature.trim()) else {
            return Ok(AuthOutcome::Rejected("signature is not hex"));
        };
        let expected = compute_signature(
            &device.secret,
            timestamp,
            request.method,
            request.path,
            request.body,
        )?;
        if !constant_time_eq(&expected, &provided) {
            return Ok(AuthOutcome::Rejected("signature mismatch"));
        }

        Ok(AuthOutcome::Authenticated(device))
    }
}

/// Ordered chain of authentication schemes
pub struct AuthGate {
    authenticators: Vec<Box<dyn Authenticator>>,
}

impl AuthGate {
    pub fn new(authenticators: Vec<Box<dyn Authenticator>>) -> Self {
        Self { authenticators }
    }

    /// Bearer first, then the signed-timestamp fallback
    pub fn standard(skew: Duration) -> Self {
        Self::new(vec![
            Box::new(BearerAuthenticator),
            Box::new(SignedRequestAuthenticator::new(skew)),
        ])
    }

    pub fn authenticate(
        &self,
        request: &AuthRequest<'_>,
        lookup: &dyn DeviceLookup,
        now: DateTime<Utc>,
    ) -> Result<Device> {
        for authenticator in &self.authenticators {
            match authenticator.authenticate(request, lookup, now)? {
                AuthOutcome::Authenticated(device) => {
                    debug!(scheme = authenticator.name(), device_id = %device.id, "Device authenticated");
                    return Ok(device);
                }
                AuthOutcome::Rejected(reason) => {
                    debug!(scheme = authenticator.name(), reason, path = request.path, "Device authentication rejected");
                    return Err(NightwatchError::Unauthorized);
                }
                AuthOutcome::NotApplicable => continue,
            }
        }

        debug!(path = request.path, "No device credentials presented");
        Err(NightwatchError::Unauthorized)
    }
}

/// Hex HMAC-SHA256 over `timestamp\nMETHOD\npath\nbody`, keyed by the
/// secret string. For clients and tests.
pub fn sign_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<String> {
    compute_signature(secret, timestamp, method, path, body).map(hex::encode)
}

fn compute_signature(
    secret: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NightwatchError::internal(format!("invalid signing key: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(b"\n");
    mac.update(method.to_ascii_uppercase().as_bytes());
    mac.update(b"\n");
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Constant-time comparison of two strings, e.g. the admin token
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Extract the value of an `Authorization: Bearer ...` header
pub fn bearer_value(header: &str) -> Option<&str> {
    let (scheme, value) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| value.trim())
}

/// Unix seconds, unix milliseconds, or RFC 3339
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return if value.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(value)
        } else {
            DateTime::from_timestamp(value, 0)
        };
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Token and secret issued at enrollment
pub struct DeviceCredentials {
    pub token: String,
    pub secret: String,
}

impl DeviceCredentials {
    /// Fresh hex credentials from the OS random source
    pub fn generate() -> Self {
        Self {
            token: random_hex(DEVICE_TOKEN_BYTES),
            secret: random_hex(DEVICE_SECRET_BYTES),
        }
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
