//! API tokens: long-lived bearer credentials.
//!
//! The `ApiToken` value carries metadata only. The secret exists in plain
//! form exactly twice: in the `IssuedToken` handed back at issuance and in
//! the store's lookup column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tmail_core::{ApiTokenId, UserId};

use crate::random::{ALPHANUMERIC, random_string};

/// Length of a generated token secret.
pub const SECRET_LEN: usize = 32;

/// A bearer secret.
///
/// `Debug` is redacted so secrets never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Draws a fresh secret from the OS random source.
    pub fn generate() -> Result<Self, rand::Error> {
        random_string(SECRET_LEN, ALPHANUMERIC).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(..)")
    }
}

/// Stored metadata of an API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    id: ApiTokenId,
    user_id: UserId,
    label: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked: bool,
}

impl ApiToken {
    /// Creates a fresh, unused, unrevoked token owned by `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, label: String) -> Self {
        Self {
            id: ApiTokenId::new(),
            user_id,
            label,
            created_at: Utc::now(),
            last_used_at: None,
            revoked: false,
        }
    }

    /// Reconstitutes a token from storage.
    #[must_use]
    pub fn with_all_fields(
        id: ApiTokenId,
        user_id: UserId,
        label: String,
        created_at: DateTime<Utc>,
        last_used_at: Option<DateTime<Utc>>,
        revoked: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            label,
            created_at,
            last_used_at,
            revoked,
        }
    }

    #[must_use]
    pub fn id(&self) -> ApiTokenId {
        self.id
    }

    /// The owning user; fixed at creation.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Records a use at `at`. Never moves the timestamp backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(self.last_used_at.map_or(at, |prev| prev.max(at)));
    }

    /// Marks the token revoked. There is no way back.
    pub fn revoke(&mut self) {
        self.revoked = true;
    }
}

/// A newly issued token together with its one-time plaintext secret.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: ApiToken,
    pub secret: TokenSecret,
}
