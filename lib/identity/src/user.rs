//! Local user accounts.
//!
//! A user is minted the first time an external identity logs in and is
//! refreshed from the provider profile on every later login. The external
//! id is fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tmail_core::UserId;

use crate::profile::ProviderProfile;

/// A local account bound to one external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    /// Provider account id; unique and immutable.
    external_id: String,
    username: String,
    avatar_url: String,
    /// May be empty when the provider withholds it.
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user from a first-time provider profile.
    #[must_use]
    pub fn from_profile(profile: &ProviderProfile) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            external_id: profile.external_id(),
            username: profile.login.clone(),
            avatar_url: profile.avatar_url.clone(),
            email: profile.email.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        external_id: String,
        username: String,
        avatar_url: String,
        email: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            external_id,
            username,
            avatar_url,
            email,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Refreshes the mutable profile fields from a later login.
    pub fn apply_profile(&mut self, profile: &ProviderProfile) {
        self.username = profile.login.clone();
        self.avatar_url = profile.avatar_url.clone();
        self.email = profile.email.clone();
        self.updated_at = Utc::now().max(self.updated_at);
    }
}
