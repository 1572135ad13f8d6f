//! One-shot OAuth `state` values.
//!
//! A state is remembered when the authorization URL is handed out and must
//! be presented, unexpired, exactly once at login.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::IdentityError;
use crate::store::LoginStateStore;

/// Longest state value accepted from a client.
pub const MAX_STATE_LEN: usize = 256;

pub struct LoginStates<S: LoginStateStore + ?Sized> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: LoginStateStore + ?Sized> LoginStates<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Remembers `state` for the configured time to live.
    pub async fn remember(&self, state: &str) -> Result<(), IdentityError> {
        if state.is_empty() || state.len() > MAX_STATE_LEN {
            return Err(IdentityError::InvalidState);
        }
        self.store.put_login_state(state, Utc::now() + self.ttl).await?;
        Ok(())
    }

    /// Consumes `state`. Fails if it was never handed out, was already used,
    /// or has expired.
    pub async fn consume(&self, state: &str) -> Result<(), IdentityError> {
        match self.store.take_login_state(state).await? {
            Some(expires_at) if expires_at >= Utc::now() => Ok(()),
            Some(_) => {
                debug!("Rejected expired login state");
                Err(IdentityError::InvalidState)
            }
            None => Err(IdentityError::InvalidState),
        }
    }

    /// Drops expired states. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, IdentityError> {
        Ok(self.store.purge_login_states(Utc::now()).await?)
    }
}
