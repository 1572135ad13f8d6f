//! Mailbox creation and listing for the authenticated caller.

use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::Identity;
use crate::error::{IdentityError, StoreError};
use crate::mailbox::Mailbox;
use crate::store::{MailboxStore, OwnedBy};
use crate::tokens::MAX_COLLISION_ATTEMPTS;

pub struct MailboxService<S: MailboxStore + ?Sized> {
    store: Arc<S>,
    domain: String,
}

impl<S: MailboxStore + ?Sized> MailboxService<S> {
    pub fn new(store: Arc<S>, domain: impl Into<String>) -> Self {
        Self {
            store,
            domain: domain.into(),
        }
    }

    /// Creates a mailbox with a random address for the caller.
    pub async fn create(&self, identity: &Identity) -> Result<Mailbox, IdentityError> {
        let mut last_conflict = None;
        for attempt in 1..=MAX_COLLISION_ATTEMPTS {
            let mailbox = Mailbox::generate(identity.user_id(), &self.domain)?;
            match self.store.insert_mailbox(&mailbox).await {
                Ok(()) => {
                    info!(
                        mailbox_id = %mailbox.id,
                        user_id = %identity.user_id(),
                        address = %mailbox.address,
                        "Created mailbox"
                    );
                    return Ok(mailbox);
                }
                Err(err) if err.is_conflict() => {
                    debug!(attempt, "Mailbox address collided, regenerating");
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(last_conflict
            .unwrap_or_else(|| StoreError::Conflict {
                constraint: "mailboxes_address_key".to_string(),
            })
            .into())
    }

    /// The caller's mailboxes, oldest first.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<Mailbox>, IdentityError> {
        Ok(self
            .store
            .list_mailboxes(OwnedBy(identity.user_id()))
            .await?)
    }
}
