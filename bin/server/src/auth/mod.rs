//! Authentication for the tmail API.
//!
//! This module provides:
//! - GitHub OAuth login ending in a freshly issued API token
//! - API token management for the authenticated caller
//! - Identity middleware and extractors for Axum routes
//!
//! Requests authenticate with `Authorization: Bearer <token>`. The
//! [`attach_identity`] layer resolves the header once per request; handlers
//! then ask for [`RequireAuth`] or [`OptionalAuth`] explicitly.

pub mod github;
pub mod middleware;
pub mod routes;

use std::sync::Arc;
use tmail_identity::{
    IdentityProvider, LoginStates, MailboxService, OwnershipGuard, RecordStore, TokenService,
};

use crate::config::AuthSettings;

pub use github::GithubClient;
pub use middleware::{AuthRejection, OptionalAuth, RequireAuth, ResolvedIdentity, attach_identity};

/// Shared application state.
pub struct AppState {
    /// Backing record store.
    pub store: Arc<dyn RecordStore>,
    /// External identity provider.
    pub provider: Arc<dyn IdentityProvider>,
    /// Identity-layer settings.
    pub settings: AuthSettings,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn IdentityProvider>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    pub fn tokens(&self) -> TokenService<dyn RecordStore> {
        TokenService::new(self.store.clone())
    }

    pub fn mailboxes(&self) -> MailboxService<dyn RecordStore> {
        MailboxService::new(self.store.clone(), self.settings.mailbox_domain.clone())
    }

    pub fn guard(&self) -> OwnershipGuard<dyn RecordStore> {
        OwnershipGuard::new(self.store.clone())
    }

    pub fn login_states(&self) -> LoginStates<dyn RecordStore> {
        LoginStates::new(self.store.clone(), self.settings.login_state_ttl())
    }
}
