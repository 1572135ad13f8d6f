//! In-memory record store.
//!
//! Mirrors the Postgres store's constraints (unique external id, secret and
//! address) so the services behave the same against either backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tmail_core::{ApiTokenId, EnvelopeId, MailboxId, UserId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::mailbox::{Attachment, Envelope, Mailbox};
use crate::store::{LoginStateStore, Lookup, MailboxStore, OwnedBy, TokenStore, UserStore};
use crate::token::{ApiToken, TokenSecret};
use crate::user::User;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    tokens: HashMap<ApiTokenId, (ApiToken, String)>,
    mailboxes: HashMap<MailboxId, Mailbox>,
    envelopes: HashMap<EnvelopeId, Envelope>,
    attachments: Vec<Attachment>,
    login_states: HashMap<String, DateTime<Utc>>,
}

impl Tables {
    fn owner_of_mailbox(&self, mailbox: MailboxId) -> Option<UserId> {
        self.mailboxes.get(&mailbox).map(|m| m.user_id)
    }

    fn owner_of_envelope(&self, envelope: EnvelopeId) -> Option<UserId> {
        self.envelopes
            .get(&envelope)
            .and_then(|e| self.owner_of_mailbox(e.mailbox_id))
    }
}

/// Record store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a delivered envelope, as the ingestion pipeline would.
    pub async fn insert_envelope(&self, envelope: Envelope) {
        self.tables
            .write()
            .await
            .envelopes
            .insert(envelope.id, envelope);
    }

    /// Stores an attachment of a delivered envelope.
    pub async fn insert_attachment(&self, attachment: Attachment) {
        self.tables.write().await.attachments.push(attachment);
    }

    /// Number of user records.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.external_id() == external_id)
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.external_id() == user.external_id())
        {
            return Err(conflict("users_external_id_key"));
        }
        tables.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id()) {
            Some(existing) => {
                *existing = User::with_all_fields(
                    existing.id(),
                    existing.external_id().to_string(),
                    user.username().to_string(),
                    user.avatar_url().to_string(),
                    user.email().to_string(),
                    existing.created_at(),
                    user.updated_at(),
                );
                Ok(())
            }
            None => Err(StoreError::Unavailable {
                details: format!("user {} vanished during update", user.id()),
            }),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(
        &self,
        token: &ApiToken,
        secret: &TokenSecret,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.tokens.values().any(|(_, s)| s == secret.as_str()) {
            return Err(conflict("api_tokens_secret_key"));
        }
        tables
            .tokens
            .insert(token.id(), (token.clone(), secret.as_str().to_string()));
        Ok(())
    }

    async fn find_token_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<(ApiToken, User)>, StoreError> {
        let tables = self.tables.read().await;
        let Some((token, _)) = tables.tokens.values().find(|(_, s)| s == secret) else {
            return Ok(None);
        };
        let user = tables
            .users
            .get(&token.user_id())
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                details: format!("token {} has no owner", token.id()),
            })?;
        Ok(Some((token.clone(), user)))
    }

    async fn find_token(&self, id: ApiTokenId) -> Result<Option<ApiToken>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.get(&id).map(|(t, _)| t.clone()))
    }

    async fn list_tokens(&self, owner: OwnedBy) -> Result<Vec<ApiToken>, StoreError> {
        let tables = self.tables.read().await;
        let mut tokens: Vec<ApiToken> = tables
            .tokens
            .values()
            .map(|(t, _)| t)
            .filter(|t| t.user_id() == owner.0)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(&a.id())));
        Ok(tokens)
    }

    async fn touch_token(
        &self,
        id: ApiTokenId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut tables = self.tables.write().await;
        let (token, _) = tables
            .tokens
            .get_mut(&id)
            .ok_or_else(|| StoreError::Unavailable {
                details: format!("token {id} vanished during touch"),
            })?;
        token.touch(at);
        Ok(token.last_used_at().unwrap_or(at))
    }

    async fn revoke_token(&self, id: ApiTokenId, owner: OwnedBy) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.tokens.get_mut(&id) {
            Some((token, _)) if token.user_id() == owner.0 => {
                token.revoke();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MailboxStore for MemoryStore {
    async fn insert_mailbox(&self, mailbox: &Mailbox) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .mailboxes
            .values()
            .any(|m| m.address == mailbox.address)
        {
            return Err(conflict("mailboxes_address_key"));
        }
        tables.mailboxes.insert(mailbox.id, mailbox.clone());
        Ok(())
    }

    async fn list_mailboxes(&self, owner: OwnedBy) -> Result<Vec<Mailbox>, StoreError> {
        let tables = self.tables.read().await;
        let mut mailboxes: Vec<Mailbox> = tables
            .mailboxes
            .values()
            .filter(|m| m.user_id == owner.0)
            .cloned()
            .collect();
        mailboxes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(mailboxes)
    }

    async fn find_mailbox(
        &self,
        address: &str,
        owner: OwnedBy,
    ) -> Result<Lookup<Mailbox>, StoreError> {
        let tables = self.tables.read().await;
        Ok(
            match tables.mailboxes.values().find(|m| m.address == address) {
                Some(m) if m.user_id == owner.0 => Lookup::Owned(m.clone()),
                Some(_) => Lookup::Foreign,
                None => Lookup::Missing,
            },
        )
    }

    async fn list_envelopes(
        &self,
        mailbox: MailboxId,
        owner: OwnedBy,
    ) -> Result<Vec<Envelope>, StoreError> {
        let tables = self.tables.read().await;
        if tables.owner_of_mailbox(mailbox) != Some(owner.0) {
            return Ok(Vec::new());
        }
        let mut envelopes: Vec<Envelope> = tables
            .envelopes
            .values()
            .filter(|e| e.mailbox_id == mailbox)
            .cloned()
            .collect();
        envelopes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(envelopes)
    }

    async fn find_envelope(
        &self,
        id: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Lookup<Envelope>, StoreError> {
        let tables = self.tables.read().await;
        let Some(envelope) = tables.envelopes.get(&id) else {
            return Ok(Lookup::Missing);
        };
        Ok(match tables.owner_of_mailbox(envelope.mailbox_id) {
            Some(user) if user == owner.0 => Lookup::Owned(envelope.clone()),
            Some(_) => Lookup::Foreign,
            None => Lookup::Missing,
        })
    }

    async fn list_attachments(
        &self,
        envelope: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Vec<Attachment>, StoreError> {
        let tables = self.tables.read().await;
        if tables.owner_of_envelope(envelope) != Some(owner.0) {
            return Ok(Vec::new());
        }
        Ok(tables
            .attachments
            .iter()
            .filter(|a| a.envelope_id == envelope)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LoginStateStore for MemoryStore {
    async fn put_login_state(
        &self,
        state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .login_states
            .entry(state.to_string())
            .or_insert(expires_at);
        Ok(())
    }

    async fn take_login_state(&self, state: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.tables.write().await.login_states.remove(state))
    }

    async fn purge_login_states(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.login_states.len();
        tables.login_states.retain(|_, expires_at| *expires_at >= now);
        Ok((before - tables.login_states.len()) as u64)
    }
}
