//! Token service: issue, validate, revoke and list API tokens.

use chrono::Utc;
use std::sync::Arc;
use tmail_core::{ApiTokenId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::auth::Identity;
use crate::error::{AuthError, IdentityError, StoreError};
use crate::store::{OwnedBy, TokenStore};
use crate::token::{ApiToken, IssuedToken, TokenSecret};

/// Attempts at generating a non-colliding value before giving up.
pub const MAX_COLLISION_ATTEMPTS: usize = 5;

/// API token lifecycle on top of a [`TokenStore`].
pub struct TokenService<S: TokenStore + ?Sized> {
    store: Arc<S>,
}

impl<S: TokenStore + ?Sized> TokenService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issues a fresh token for `user_id`. The returned secret is the only
    /// copy the caller will ever see.
    pub async fn issue(&self, user_id: UserId, label: &str) -> Result<IssuedToken, IdentityError> {
        let mut last_conflict = None;
        for attempt in 1..=MAX_COLLISION_ATTEMPTS {
            let secret = TokenSecret::generate()?;
            let token = ApiToken::new(user_id, label.to_string());
            match self.store.insert_token(&token, &secret).await {
                Ok(()) => {
                    info!(token_id = %token.id(), user_id = %user_id, "Issued API token");
                    return Ok(IssuedToken { token, secret });
                }
                Err(err) if err.is_conflict() => {
                    debug!(attempt, "Token secret collided, regenerating");
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(last_conflict
            .unwrap_or_else(|| StoreError::Conflict {
                constraint: "api_tokens_secret_key".to_string(),
            })
            .into())
    }

    /// Resolves a presented secret to the identity it belongs to.
    ///
    /// Recording the use is best effort: a failed touch is logged and the
    /// validation still succeeds.
    #[instrument(skip_all)]
    pub async fn validate(&self, secret: &str) -> Result<Identity, IdentityError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidToken.into());
        }

        let Some((mut token, user)) = self.store.find_token_by_secret(secret).await? else {
            return Err(AuthError::InvalidToken.into());
        };
        if token.is_revoked() {
            debug!(token_id = %token.id(), "Rejected revoked token");
            return Err(AuthError::Revoked.into());
        }

        match self.store.touch_token(token.id(), Utc::now()).await {
            Ok(at) => token.touch(at),
            Err(err) => warn!(token_id = %token.id(), error = %err, "Failed to record token use"),
        }

        Ok(Identity::new(user, token))
    }

    /// Revokes a token on behalf of `requester`. Revoking twice is harmless.
    pub async fn revoke(
        &self,
        token_id: ApiTokenId,
        requester: UserId,
    ) -> Result<ApiToken, IdentityError> {
        let Some(mut token) = self.store.find_token(token_id).await? else {
            return Err(IdentityError::NotFound { resource: "token" });
        };
        if token.user_id() != requester {
            warn!(token_id = %token_id, user_id = %requester, "Refused to revoke foreign token");
            return Err(AuthError::Forbidden.into());
        }
        if !self.store.revoke_token(token_id, OwnedBy(requester)).await? {
            return Err(IdentityError::NotFound { resource: "token" });
        }
        token.revoke();
        info!(token_id = %token_id, user_id = %requester, "Revoked API token");
        Ok(token)
    }

    /// Lists the owner's tokens, newest first. Secrets are not included.
    pub async fn list(&self, owner: UserId) -> Result<Vec<ApiToken>, IdentityError> {
        Ok(self.store.list_tokens(OwnedBy(owner)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::profile::ProviderProfile;
    use crate::store::UserStore;
    use crate::user::User;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded_user(store: &MemoryStore, id: i64) -> User {
        let user = User::from_profile(&ProviderProfile {
            id,
            login: format!("user{id}"),
            ..Default::default()
        });
        store.create_user(&user).await.expect("seed user");
        user
    }

    #[tokio::test]
    async fn issued_token_validates_to_its_owner() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let service = TokenService::new(store.clone());

        let issued = service.issue(alice.id(), "default").await.expect("issue");
        let identity = service.validate(issued.secret.as_str()).await.expect("valid");

        assert_eq!(identity.user_id(), alice.id());
        assert_eq!(identity.token().id(), issued.token.id());
        assert!(identity.token().last_used_at().is_some());
    }

    #[tokio::test]
    async fn unknown_secret_is_invalid_not_someone_elses() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let service = TokenService::new(store.clone());
        service.issue(alice.id(), "default").await.expect("issue");

        let err = service.validate("wrong").await.expect_err("unknown");
        assert!(matches!(err, IdentityError::Auth(AuthError::InvalidToken)));

        let err = service.validate("").await.expect_err("empty");
        assert!(matches!(err, IdentityError::Auth(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_with_correct_secret() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let service = TokenService::new(store.clone());
        let issued = service.issue(alice.id(), "ci").await.expect("issue");

        let revoked = service.revoke(issued.token.id(), alice.id()).await.expect("revoke");
        assert!(revoked.is_revoked());
        service
            .revoke(issued.token.id(), alice.id())
            .await
            .expect("second revoke is a no-op");

        let err = service
            .validate(issued.secret.as_str())
            .await
            .expect_err("revoked");
        assert!(matches!(err, IdentityError::Auth(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn sequential_validations_never_move_last_used_back() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let service = TokenService::new(store.clone());
        let issued = service.issue(alice.id(), "default").await.expect("issue");

        let first = service.validate(issued.secret.as_str()).await.expect("first");
        let second = service.validate(issued.secret.as_str()).await.expect("second");

        let first_used = first.token().last_used_at().expect("touched");
        let second_used = second.token().last_used_at().expect("touched");
        assert!(second_used >= first_used);
    }

    #[tokio::test]
    async fn revoking_foreign_or_missing_tokens() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let bob = seeded_user(&store, 2).await;
        let service = TokenService::new(store.clone());
        let issued = service.issue(alice.id(), "default").await.expect("issue");

        let err = service
            .revoke(issued.token.id(), bob.id())
            .await
            .expect_err("foreign");
        assert!(matches!(err, IdentityError::Auth(AuthError::Forbidden)));

        let err = service
            .revoke(ApiTokenId::new(), alice.id())
            .await
            .expect_err("missing");
        assert!(matches!(err, IdentityError::NotFound { resource: "token" }));

        service
            .validate(issued.secret.as_str())
            .await
            .expect("still valid after refused revoke");
    }

    #[tokio::test]
    async fn list_returns_only_owner_tokens() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let bob = seeded_user(&store, 2).await;
        let service = TokenService::new(store.clone());
        service.issue(alice.id(), "a1").await.expect("issue");
        service.issue(alice.id(), "a2").await.expect("issue");
        service.issue(bob.id(), "b1").await.expect("issue");

        let tokens = service.list(alice.id()).await.expect("list");

        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.user_id() == alice.id()));
    }

    #[tokio::test]
    async fn concurrent_issues_produce_distinct_secrets() {
        let store = Arc::new(MemoryStore::new());
        let alice = seeded_user(&store, 1).await;
        let service = Arc::new(TokenService::new(store.clone()));

        let mut handles = Vec::new();
        for i in 0..32 {
            let service = service.clone();
            let user = alice.id();
            handles.push(tokio::spawn(async move {
                service.issue(user, &format!("t{i}")).await
            }));
        }

        let mut secrets = HashSet::new();
        for handle in handles {
            let issued = handle.await.expect("join").expect("issue");
            assert!(secrets.insert(issued.secret.into_inner()));
        }
        assert_eq!(secrets.len(), 32);
    }

    /// Rejects the first `conflicts` inserts as secret collisions.
    struct CollidingStore {
        inner: MemoryStore,
        conflicts: AtomicUsize,
    }

    #[async_trait]
    impl TokenStore for CollidingStore {
        async fn insert_token(
            &self,
            token: &ApiToken,
            secret: &TokenSecret,
        ) -> Result<(), StoreError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict {
                    constraint: "api_tokens_secret_key".to_string(),
                });
            }
            self.inner.insert_token(token, secret).await
        }

        async fn find_token_by_secret(
            &self,
            secret: &str,
        ) -> Result<Option<(ApiToken, User)>, StoreError> {
            self.inner.find_token_by_secret(secret).await
        }

        async fn find_token(&self, id: ApiTokenId) -> Result<Option<ApiToken>, StoreError> {
            self.inner.find_token(id).await
        }

        async fn list_tokens(&self, owner: OwnedBy) -> Result<Vec<ApiToken>, StoreError> {
            self.inner.list_tokens(owner).await
        }

        async fn touch_token(
            &self,
            id: ApiTokenId,
            at: DateTime<Utc>,
        ) -> Result<DateTime<Utc>, StoreError> {
            self.inner.touch_token(id, at).await
        }

        async fn revoke_token(&self, id: ApiTokenId, owner: OwnedBy) -> Result<bool, StoreError> {
            self.inner.revoke_token(id, owner).await
        }
    }

    #[tokio::test]
    async fn collisions_are_retried_then_reported() {
        let store = Arc::new(CollidingStore {
            inner: MemoryStore::new(),
            conflicts: AtomicUsize::new(MAX_COLLISION_ATTEMPTS - 1),
        });
        let service = TokenService::new(store.clone());
        service
            .issue(UserId::new(), "default")
            .await
            .expect("last attempt succeeds");

        store.conflicts.store(MAX_COLLISION_ATTEMPTS, Ordering::SeqCst);
        let err = service
            .issue(UserId::new(), "default")
            .await
            .expect_err("every attempt collides");
        assert!(matches!(err, IdentityError::Store(StoreError::Conflict { .. })));
    }

    /// Validation succeeds even when the last-used write fails.
    struct StuckClockStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl TokenStore for StuckClockStore {
        async fn insert_token(
            &self,
            token: &ApiToken,
            secret: &TokenSecret,
        ) -> Result<(), StoreError> {
            self.inner.insert_token(token, secret).await
        }

        async fn find_token_by_secret(
            &self,
            secret: &str,
        ) -> Result<Option<(ApiToken, User)>, StoreError> {
            self.inner.find_token_by_secret(secret).await
        }

        async fn find_token(&self, id: ApiTokenId) -> Result<Option<ApiToken>, StoreError> {
            self.inner.find_token(id).await
        }

        async fn list_tokens(&self, owner: OwnedBy) -> Result<Vec<ApiToken>, StoreError> {
            self.inner.list_tokens(owner).await
        }

        async fn touch_token(
            &self,
            _: ApiTokenId,
            _: DateTime<Utc>,
        ) -> Result<DateTime<Utc>, StoreError> {
            Err(StoreError::Unavailable {
                details: "read-only replica".to_string(),
            })
        }

        async fn revoke_token(&self, id: ApiTokenId, owner: OwnedBy) -> Result<bool, StoreError> {
            self.inner.revoke_token(id, owner).await
        }
    }

    #[tokio::test]
    async fn touch_failure_does_not_fail_validation() {
        let inner = MemoryStore::new();
        let alice = seeded_user(&inner, 1).await;
        let service = TokenService::new(Arc::new(StuckClockStore { inner }));
        let issued = service.issue(alice.id(), "default").await.expect("issue");

        let identity = service.validate(issued.secret.as_str()).await.expect("valid");

        assert_eq!(identity.user_id(), alice.id());
        assert!(identity.token().last_used_at().is_none());
    }
}
