//! Resource ownership guard.
//!
//! Every read of a mailbox or envelope goes through here. The store answers
//! with a [`Lookup`], which this guard turns into data, `Forbidden` or
//! `NotFound`. Envelopes inherit ownership from their mailbox.

use std::sync::Arc;
use tmail_core::EnvelopeId;
use tracing::warn;

use crate::auth::Identity;
use crate::error::{AuthError, IdentityError};
use crate::mailbox::{Attachment, Envelope, Mailbox};
use crate::store::{Lookup, MailboxStore, OwnedBy};

pub struct OwnershipGuard<S: MailboxStore + ?Sized> {
    store: Arc<S>,
}

impl<S: MailboxStore + ?Sized> OwnershipGuard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The mailbox at `address`, if the caller owns it.
    pub async fn mailbox(
        &self,
        identity: &Identity,
        address: &str,
    ) -> Result<Mailbox, IdentityError> {
        let lookup = self
            .store
            .find_mailbox(address, OwnedBy(identity.user_id()))
            .await?;
        settle(lookup, identity, "mailbox")
    }

    /// Envelopes of the caller's mailbox at `address`, newest first.
    pub async fn envelopes(
        &self,
        identity: &Identity,
        address: &str,
    ) -> Result<Vec<Envelope>, IdentityError> {
        let mailbox = self.mailbox(identity, address).await?;
        Ok(self
            .store
            .list_envelopes(mailbox.id, OwnedBy(identity.user_id()))
            .await?)
    }

    /// One envelope with its attachments, if its mailbox is the caller's.
    pub async fn envelope(
        &self,
        identity: &Identity,
        id: EnvelopeId,
    ) -> Result<(Envelope, Vec<Attachment>), IdentityError> {
        let owner = OwnedBy(identity.user_id());
        let lookup = self.store.find_envelope(id, owner).await?;
        let envelope = settle(lookup, identity, "email")?;
        let attachments = self.store.list_attachments(envelope.id, owner).await?;
        Ok((envelope, attachments))
    }
}

fn settle<T>(
    lookup: Lookup<T>,
    identity: &Identity,
    resource: &'static str,
) -> Result<T, IdentityError> {
    match lookup {
        Lookup::Owned(value) => Ok(value),
        Lookup::Foreign => {
            warn!(user_id = %identity.user_id(), resource, "Denied access to foreign resource");
            Err(AuthError::Forbidden.into())
        }
        Lookup::Missing => Err(IdentityError::NotFound { resource }),
    }
}
