//! Record store traits.
//!
//! The identity services only see these traits. The server backs them with
//! Postgres; tests use [`crate::memory::MemoryStore`].
//!
//! Every call that fetches a user-owned resource takes an explicit
//! [`OwnedBy`] predicate, and lookups by identifier answer with a
//! three-way [`Lookup`] so callers can tell "someone else's" from "absent".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tmail_core::{ApiTokenId, EnvelopeId, MailboxId, UserId};

use crate::error::StoreError;
use crate::mailbox::{Attachment, Envelope, Mailbox};
use crate::token::{ApiToken, TokenSecret};
use crate::user::User;

/// Ownership predicate threaded through resource queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedBy(pub UserId);

/// Outcome of an ownership-filtered lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The record exists and belongs to the requested owner.
    Owned(T),
    /// The record exists but belongs to someone else. No data is returned.
    Foreign,
    /// No record with that identifier.
    Missing,
}

/// User records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by provider id. `Ok(None)` means no such user.
    async fn find_user_by_external_id(&self, external_id: &str)
    -> Result<Option<User>, StoreError>;

    /// Inserts a new user. Fails with `Conflict` if the external id is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Writes the mutable profile fields of an existing user.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
}

/// API token records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Inserts a token. Fails with `Conflict` if the secret is taken.
    async fn insert_token(&self, token: &ApiToken, secret: &TokenSecret)
    -> Result<(), StoreError>;

    /// Finds the token whose secret equals `secret`, with its owner.
    async fn find_token_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<(ApiToken, User)>, StoreError>;

    /// Finds a token by id.
    async fn find_token(&self, id: ApiTokenId) -> Result<Option<ApiToken>, StoreError>;

    /// Lists the owner's tokens, newest first.
    async fn list_tokens(&self, owner: OwnedBy) -> Result<Vec<ApiToken>, StoreError>;

    /// Records a use at `at` and returns the stored last-used time, which
    /// never moves backwards.
    async fn touch_token(
        &self,
        id: ApiTokenId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Sets the revoked flag if the token belongs to `owner`.
    /// Returns false if no such token is owned by `owner`.
    async fn revoke_token(&self, id: ApiTokenId, owner: OwnedBy) -> Result<bool, StoreError>;
}

/// Mailboxes and their messages.
#[async_trait]
pub trait MailboxStore: Send + Sync {
    /// Inserts a mailbox. Fails with `Conflict` if the address is taken.
    async fn insert_mailbox(&self, mailbox: &Mailbox) -> Result<(), StoreError>;

    /// Lists the owner's mailboxes, oldest first.
    async fn list_mailboxes(&self, owner: OwnedBy) -> Result<Vec<Mailbox>, StoreError>;

    /// Looks up a mailbox by address.
    async fn find_mailbox(
        &self,
        address: &str,
        owner: OwnedBy,
    ) -> Result<Lookup<Mailbox>, StoreError>;

    /// Lists envelopes of a mailbox owned by `owner`, newest first.
    async fn list_envelopes(
        &self,
        mailbox: MailboxId,
        owner: OwnedBy,
    ) -> Result<Vec<Envelope>, StoreError>;

    /// Looks up an envelope by id; ownership is decided by its mailbox.
    async fn find_envelope(
        &self,
        id: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Lookup<Envelope>, StoreError>;

    /// Lists attachments of an envelope owned (via its mailbox) by `owner`.
    async fn list_attachments(
        &self,
        envelope: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Vec<Attachment>, StoreError>;
}

/// Pending OAuth `state` values.
#[async_trait]
pub trait LoginStateStore: Send + Sync {
    /// Remembers `state` until `expires_at`. A state that is already pending
    /// keeps its original expiry.
    async fn put_login_state(
        &self,
        state: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Removes `state` and returns its expiry if it was pending.
    async fn take_login_state(&self, state: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Drops states that expired before `now`. Returns how many went.
    async fn purge_login_states(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Everything the server needs from one backing store.
pub trait RecordStore: UserStore + TokenStore + MailboxStore + LoginStateStore {}

impl<T> RecordStore for T where T: UserStore + TokenStore + MailboxStore + LoginStateStore {}
