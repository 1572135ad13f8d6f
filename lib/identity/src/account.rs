//! Account resolution: provider profile to local user.

use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ExternalAuthError, IdentityError};
use crate::profile::ProviderProfile;
use crate::store::UserStore;
use crate::user::User;

/// Maps external identities to local users. The only place users are minted.
pub struct AccountResolver<S: UserStore + ?Sized> {
    store: Arc<S>,
}

impl<S: UserStore + ?Sized> AccountResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Finds the user for `profile`, refreshing its profile fields, or creates
    /// one on first sight.
    ///
    /// A concurrent login for the same external id may win the insert; the
    /// loser re-reads and applies its profile as an update.
    pub async fn resolve(&self, profile: &ProviderProfile) -> Result<User, IdentityError> {
        if !profile.is_identified() {
            let report: Report<ExternalAuthError> = ExternalAuthError::MalformedProfile {
                reason: "profile has no account id".to_string(),
            }
            .into();
            return Err(report.into());
        }

        let external_id = profile.external_id();
        if let Some(user) = self.refresh(&external_id, profile).await? {
            return Ok(user);
        }

        let user = User::from_profile(profile);
        match self.store.create_user(&user).await {
            Ok(()) => {
                info!(user_id = %user.id(), external_id = %external_id, "Created user");
                Ok(user)
            }
            Err(err) if err.is_conflict() => {
                debug!(external_id = %external_id, "Lost user creation race, updating instead");
                self.refresh(&external_id, profile)
                    .await?
                    .ok_or(IdentityError::Store(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn refresh(
        &self,
        external_id: &str,
        profile: &ProviderProfile,
    ) -> Result<Option<User>, IdentityError> {
        let Some(mut user) = self.store.find_user_by_external_id(external_id).await? else {
            return Ok(None);
        };
        user.apply_profile(profile);
        self.store.update_user(&user).await?;
        debug!(user_id = %user.id(), "Refreshed user profile");
        Ok(Some(user))
    }
}
