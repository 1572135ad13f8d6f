//! Mailboxes and the messages delivered to them.
//!
//! Envelopes and attachments are written by the ingestion pipeline; this
//! crate only reads them through their owning mailbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tmail_core::{AttachmentId, EnvelopeId, MailboxId, UserId};

use crate::random::{LOWER_ALPHANUMERIC, random_string};

/// Length of a generated mailbox local part.
pub const LOCAL_PART_LEN: usize = 8;

/// A disposable address owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub id: MailboxId,
    pub user_id: UserId,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl Mailbox {
    /// Creates a mailbox with a random local part at `domain`.
    pub fn generate(user_id: UserId, domain: &str) -> Result<Self, rand::Error> {
        let local = random_string(LOCAL_PART_LEN, LOWER_ALPHANUMERIC)?;
        Ok(Self {
            id: MailboxId::new(),
            user_id,
            address: format!("{local}@{domain}"),
            created_at: Utc::now(),
        })
    }
}

/// A received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EnvelopeId,
    pub mailbox_id: MailboxId,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A file attached to an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub envelope_id: EnvelopeId,
    pub filename: String,
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_address_has_random_local_part() {
        let mailbox = Mailbox::generate(UserId::new(), "mail.4w.ink").expect("entropy");
        let (local, domain) = mailbox.address.split_once('@').expect("has @");

        assert_eq!(local.len(), LOCAL_PART_LEN);
        assert!(local.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(domain, "mail.4w.ink");
    }
}
