//! Completing an OAuth login: code to local user plus a fresh API token.

use std::sync::Arc;
use tracing::info;

use crate::account::AccountResolver;
use crate::error::IdentityError;
use crate::provider::IdentityProvider;
use crate::store::{TokenStore, UserStore};
use crate::token::IssuedToken;
use crate::tokens::TokenService;
use crate::user::User;

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub issued: IssuedToken,
}

/// Exchanges `code`, resolves the account and issues a token labelled
/// `label`. Steps run strictly in sequence; the first failure aborts.
pub async fn complete_login<P, S>(
    provider: &P,
    store: Arc<S>,
    code: &str,
    label: &str,
) -> Result<LoginOutcome, IdentityError>
where
    P: IdentityProvider + ?Sized,
    S: UserStore + TokenStore + ?Sized,
{
    let access_token = provider.exchange_code(code).await?;
    let profile = provider.fetch_profile(&access_token).await?;
    let user = AccountResolver::new(store.clone()).resolve(&profile).await?;
    let issued = TokenService::new(store).issue(user.id(), label).await?;
    info!(user_id = %user.id(), username = %user.username(), "Login completed");
    Ok(LoginOutcome { user, issued })
}
