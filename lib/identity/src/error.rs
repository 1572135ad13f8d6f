//! Error types for the identity crate.
//!
//! - `ExternalAuthError`: the OAuth provider was unreachable or said no
//! - `AuthError`: a bearer credential or an ownership check was rejected
//! - `StoreError`: the record store failed
//! - `IdentityError`: what the services return, wrapping the above

use rootcause::Report;
use std::fmt;

/// Failures talking to the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalAuthError {
    /// A required provider setting is absent or empty.
    NotConfigured { field: &'static str },
    /// A provider setting is present but unusable.
    InvalidConfiguration { field: &'static str, reason: String },
    /// The request to the provider failed (network, non-2xx, bad body).
    Request { endpoint: String, reason: String },
    /// The provider did not answer within the configured timeout.
    Timeout { endpoint: String },
    /// The provider answered with a non-success status.
    Status { endpoint: String, status: u16 },
    /// The token endpoint answered without an access token.
    MissingAccessToken,
    /// The profile response could not be used.
    MalformedProfile { reason: String },
}

impl fmt::Display for ExternalAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured { field } => {
                write!(f, "identity provider is not configured: missing {field}")
            }
            Self::InvalidConfiguration { field, reason } => {
                write!(f, "invalid identity provider setting {field}: {reason}")
            }
            Self::Request { endpoint, reason } => {
                write!(f, "request to {endpoint} failed: {reason}")
            }
            Self::Timeout { endpoint } => write!(f, "request to {endpoint} timed out"),
            Self::Status { endpoint, status } => {
                write!(f, "{endpoint} answered with status {status}")
            }
            Self::MissingAccessToken => write!(f, "provider returned no access token"),
            Self::MalformedProfile { reason } => {
                write!(f, "malformed provider profile: {reason}")
            }
        }
    }
}

impl std::error::Error for ExternalAuthError {}

/// Rejections of a bearer credential or of resource access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No token matches the presented secret.
    InvalidToken,
    /// The token exists but has been revoked.
    Revoked,
    /// The caller does not own the resource.
    Forbidden,
}

impl AuthError {
    /// The client-facing reason string.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid token",
            Self::Revoked => "token revoked",
            Self::Forbidden => "access denied",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for AuthError {}

/// Record store failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    Conflict { constraint: String },
    /// The store could not be reached or the query failed.
    Unavailable { details: String },
    /// A stored row could not be turned back into a domain value.
    Corrupt { details: String },
}

impl StoreError {
    /// Returns true for uniqueness conflicts, the only retryable failure.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { constraint } => {
                write!(f, "unique constraint violated: {constraint}")
            }
            Self::Unavailable { details } => write!(f, "record store unavailable: {details}"),
            Self::Corrupt { details } => write!(f, "corrupt record: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors returned by the identity services.
#[derive(Debug)]
pub enum IdentityError {
    /// The identity provider failed.
    External(Report<ExternalAuthError>),
    /// A credential or ownership check failed.
    Auth(AuthError),
    /// The record store failed.
    Store(StoreError),
    /// The addressed record does not exist.
    NotFound { resource: &'static str },
    /// A login state was unknown, expired, or unusable.
    InvalidState,
    /// The OS random source failed.
    Entropy { details: String },
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External(report) => write!(f, "external authentication failed: {report}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound { resource } => write!(f, "{resource} not found"),
            Self::InvalidState => write!(f, "invalid login state"),
            Self::Entropy { details } => write!(f, "random source failed: {details}"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<Report<ExternalAuthError>> for IdentityError {
    fn from(report: Report<ExternalAuthError>) -> Self {
        Self::External(report)
    }
}

impl From<AuthError> for IdentityError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<rand::Error> for IdentityError {
    fn from(err: rand::Error) -> Self {
        Self::Entropy {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_reasons_are_client_strings() {
        assert_eq!(AuthError::InvalidToken.to_string(), "invalid token");
        assert_eq!(AuthError::Revoked.to_string(), "token revoked");
        assert_eq!(AuthError::Forbidden.to_string(), "access denied");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = StoreError::Conflict {
            constraint: "api_tokens_secret_key".to_string(),
        };
        let down = StoreError::Unavailable {
            details: "connection refused".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(!down.is_conflict());
    }

    #[test]
    fn not_configured_names_the_field() {
        let err = ExternalAuthError::NotConfigured {
            field: "client_secret",
        };
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn not_found_names_the_resource() {
        let err = IdentityError::NotFound { resource: "email" };
        assert_eq!(err.to_string(), "email not found");
    }
}
