//! Request identity and bearer header parsing.
//!
//! Both middleware modes go through [`parse_bearer`] so every endpoint
//! agrees on what a well-formed `Authorization` header is.

use tmail_core::UserId;

use crate::token::ApiToken;
use crate::user::User;

/// Authentication scheme accepted in the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

/// The caller behind a validated bearer token.
///
/// Handlers receive this explicitly; it is never looked up ambiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user: User,
    token: ApiToken,
}

impl Identity {
    #[must_use]
    pub fn new(user: User, token: ApiToken) -> Self {
        Self { user, token }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user.id()
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The token the request authenticated with.
    #[must_use]
    pub fn token(&self) -> &ApiToken {
        &self.token
    }
}

/// Why a header did not yield a bearer secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    /// No `Authorization` header.
    Missing,
    /// Present but not exactly `Bearer <secret>`.
    Malformed,
}

/// Extracts the secret from an `Authorization` header value.
///
/// The value must split on single spaces into exactly two parts, the first
/// being `Bearer` (case-sensitive).
pub fn parse_bearer(header: Option<&str>) -> Result<&str, BearerError> {
    let value = header.ok_or(BearerError::Missing)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(secret), None) => Ok(secret),
        _ => Err(BearerError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_secret() {
        assert_eq!(parse_bearer(Some("Bearer tok1")), Ok("tok1"));
    }

    #[test]
    fn missing_header() {
        assert_eq!(parse_bearer(None), Err(BearerError::Missing));
    }

    #[test]
    fn rejects_other_schemes_and_shapes() {
        for value in [
            "Token abc",
            "bearer abc",
            "BEARER abc",
            "Bearer",
            "Bearer  abc",
            "Bearer abc def",
            "",
        ] {
            assert_eq!(
                parse_bearer(Some(value)),
                Err(BearerError::Malformed),
                "{value:?} should be malformed"
            );
        }
    }

    #[test]
    fn empty_secret_still_parses() {
        // Rejected later by validation as an invalid token.
        assert_eq!(parse_bearer(Some("Bearer ")), Ok(""));
    }

    #[test]
    fn identity_exposes_owner() {
        let profile = crate::ProviderProfile {
            id: 1,
            login: "alice".to_string(),
            ..Default::default()
        };
        let user = User::from_profile(&profile);
        let token = ApiToken::new(user.id(), "default".to_string());
        let identity = Identity::new(user.clone(), token);

        assert_eq!(identity.user_id(), user.id());
        assert_eq!(identity.token().user_id(), user.id());
    }
}
