//! The external OAuth identity provider seen from the identity services.

use async_trait::async_trait;

use crate::error::ExternalAuthError;
use crate::profile::ProviderProfile;

/// An OAuth authorization-code identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The URL to send the browser to, carrying the caller's `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Trades an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> tmail_core::Result<String, ExternalAuthError>;

    /// Fetches the profile of the account behind `access_token`.
    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> tmail_core::Result<ProviderProfile, ExternalAuthError>;
}
