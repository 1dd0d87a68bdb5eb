//! Request extraction helpers

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use nightwatch_core::{AUTHORIZATION_HEADER, Caller, HeaderSource, bearer_value};
use nightwatch_util::{DeviceId, ExtraTimeId, NightwatchError};
use serde::de::DeserializeOwned;

use crate::{ApiError, AppState};

/// Parent session token issued by the identity provider
pub const PARENT_SESSION_HEADER: &str = "x-parent-session";

/// Header view over an axum request
pub struct HttpHeaders<'a>(pub &'a HeaderMap);

impl HeaderSource for HttpHeaders<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Authenticated caller of the parent surface
pub struct ParentCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for ParentCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = HttpHeaders(&parts.headers);
        let bearer = headers.header(AUTHORIZATION_HEADER).and_then(bearer_value);
        let session = headers
            .header(PARENT_SESSION_HEADER)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let caller = state.engine.resolve_caller(bearer, session, state.now())?;
        Ok(ParentCaller(caller))
    }
}

/// Deserialize a JSON body, reporting failures as validation errors
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(NightwatchError::validation("body", e.to_string())))
}

/// Ids that do not parse cannot name anything
pub fn parse_device_id(raw: &str) -> Result<DeviceId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(NightwatchError::not_found("device")))
}

pub fn parse_request_id(raw: &str) -> Result<ExtraTimeId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(NightwatchError::not_found("extra time request")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use nightwatch_api::ExtraTimeAsk;

    #[test]
    fn headers_are_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert("x-device-token", HeaderValue::from_static("abc123"));
        let headers = HttpHeaders(&map);
        assert_eq!(headers.header("x-device-token"), Some("abc123"));
        assert_eq!(headers.header("X-Device-Token"), Some("abc123"));
        assert_eq!(headers.header("x-signature"), None);
    }

    #[test]
    fn malformed_json_is_a_body_validation_error() {
        let err = parse_json::<ExtraTimeAsk>(b"{\"minutes\": \"lots\"}").unwrap_err();
        match err.0 {
            NightwatchError::Validation { field, .. } => assert_eq!(field, "body"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bad_ids_are_not_found() {
        assert!(matches!(
            parse_device_id("not-a-uuid").unwrap_err().0,
            NightwatchError::NotFound(_)
        ));
        let id = DeviceId::new();
        assert_eq!(parse_device_id(&id.to_string()).unwrap(), id);
    }
}
