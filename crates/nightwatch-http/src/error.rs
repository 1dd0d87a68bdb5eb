//! Error to response mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nightwatch_api::{ErrorBody, ErrorCode};
use nightwatch_util::NightwatchError;
use tracing::error;

/// Engine error on its way out as JSON
#[derive(Debug)]
pub struct ApiError(pub NightwatchError);

impl From<NightwatchError> for ApiError {
    fn from(e: NightwatchError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            NightwatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            NightwatchError::Forbidden => StatusCode::FORBIDDEN,
            NightwatchError::Validation { .. } => StatusCode::BAD_REQUEST,
            NightwatchError::AlreadyResolved => StatusCode::CONFLICT,
            NightwatchError::NotFound(_) => StatusCode::NOT_FOUND,
            NightwatchError::Store(_) | NightwatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match &self.0 {
            NightwatchError::Unauthorized => ErrorBody::new(ErrorCode::Unauthorized, "Unauthorized"),
            NightwatchError::Forbidden => ErrorBody::new(ErrorCode::Forbidden, "Forbidden"),
            NightwatchError::Validation { field, message } => {
                ErrorBody::new(ErrorCode::ValidationFailed, message.clone()).with_field(field.clone())
            }
            NightwatchError::AlreadyResolved => ErrorBody::new(
                ErrorCode::AlreadyResolved,
                "This request was already handled",
            ),
            NightwatchError::NotFound(what) => {
                ErrorBody::new(ErrorCode::NotFound, format!("{} not found", what))
            }
            NightwatchError::Store(_) | NightwatchError::Internal(_) => {
                ErrorBody::new(ErrorCode::InternalError, "Internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (NightwatchError::Unauthorized, StatusCode::UNAUTHORIZED),
            (NightwatchError::Forbidden, StatusCode::FORBIDDEN),
            (NightwatchError::validation("minutes", "bad"), StatusCode::BAD_REQUEST),
            (NightwatchError::AlreadyResolved, StatusCode::CONFLICT),
            (NightwatchError::not_found("device"), StatusCode::NOT_FOUND),
            (NightwatchError::store("disk full"), StatusCode::INTERNAL_SERVER_ERROR),
            (NightwatchError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status_code(), status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let body = ApiError(NightwatchError::store("/var/lib/nightwatch/nightwatch.db locked")).body();
        assert_eq!(body.error, ErrorCode::InternalError);
        assert!(!body.message.contains("nightwatch.db"));
    }

    #[test]
    fn validation_carries_field() {
        let body = ApiError(NightwatchError::validation("timezone", "unknown zone")).body();
        assert_eq!(body.error, ErrorCode::ValidationFailed);
        assert_eq!(body.field.as_deref(), Some("timezone"));
    }
}
