//! HTTP error responses.
//!
//! Every failure leaves the API as `{"error": "<message>"}`. Internal
//! details are logged here and replaced with generic messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tmail_identity::IdentityError;

/// An API failure with its client-facing status and message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{resource} not found"))
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::External(report) => {
                tracing::warn!(error = %report, "External authentication failed");
                Self::unauthorized("authentication failed")
            }
            IdentityError::Auth(reason) => {
                let status = match reason {
                    tmail_identity::AuthError::Forbidden => StatusCode::FORBIDDEN,
                    _ => StatusCode::UNAUTHORIZED,
                };
                Self::new(status, reason.reason())
            }
            IdentityError::NotFound { resource } => Self::not_found(resource),
            IdentityError::InvalidState => Self::bad_request("invalid state"),
            IdentityError::Store(err) => {
                tracing::error!(error = %err, "Record store failure");
                Self::internal()
            }
            IdentityError::Entropy { details } => {
                tracing::error!(error = %details, "Random source failure");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmail_identity::{AuthError, ExternalAuthError, StoreError};

    #[test]
    fn auth_errors_map_to_documented_statuses() {
        let cases = [
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid token"),
            (AuthError::Revoked, StatusCode::UNAUTHORIZED, "token revoked"),
            (AuthError::Forbidden, StatusCode::FORBIDDEN, "access denied"),
        ];
        for (reason, status, message) in cases {
            let err = ApiError::from(IdentityError::Auth(reason));
            assert_eq!(err.status(), status);
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::from(IdentityError::Store(StoreError::Unavailable {
            details: "password authentication failed for user tmail".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "internal server error");

        let err = ApiError::from(IdentityError::External(
            ExternalAuthError::Status {
                endpoint: "https://github.com/login/oauth/access_token".to_string(),
                status: 502,
            }
            .into(),
        ));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "authentication failed");
    }

    #[test]
    fn not_found_names_resource() {
        let err = ApiError::from(IdentityError::NotFound { resource: "email" });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "email not found");
    }
}
