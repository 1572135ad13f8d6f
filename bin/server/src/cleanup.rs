//! Background purge of expired OAuth login states.

use std::sync::Arc;
use std::time::Duration;
use tmail_identity::{LoginStateStore, LoginStates};
use tokio::task::JoinHandle;

/// Purges expired login states once, logging the outcome.
pub async fn purge_login_states<S: LoginStateStore + ?Sized>(states: &LoginStates<S>) {
    match states.purge_expired().await {
        Ok(count) if count > 0 => {
            tracing::debug!(deleted_login_states = count, "Purged expired login states");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to purge expired login states");
        }
    }
}

/// Spawns the periodic purge task.
pub fn spawn_login_state_cleanup<S>(states: Arc<LoginStates<S>>, every: Duration) -> JoinHandle<()>
where
    S: LoginStateStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            purge_login_states(&states).await;
        }
    })
}
