//! Mailboxes, envelopes and attachments.
//!
//! Envelope and attachment queries join through `mailboxes` so the owner
//! check happens in the query itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tmail_core::{EnvelopeId, MailboxId};
use tmail_identity::{Attachment, Envelope, Lookup, Mailbox, MailboxStore, OwnedBy, StoreError};

use super::{PgStore, parse_id, store_error};

#[derive(FromRow)]
struct MailboxRow {
    id: String,
    user_id: String,
    address: String,
    created_at: DateTime<Utc>,
}

impl MailboxRow {
    fn try_into_mailbox(self) -> Result<Mailbox, StoreError> {
        Ok(Mailbox {
            id: parse_id("mailboxes.id", &self.id)?,
            user_id: parse_id("mailboxes.user_id", &self.user_id)?,
            address: self.address,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct EnvelopeRow {
    id: String,
    mailbox_id: String,
    sender: String,
    recipient: String,
    subject: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl EnvelopeRow {
    fn try_into_envelope(self) -> Result<Envelope, StoreError> {
        Ok(Envelope {
            id: parse_id("envelopes.id", &self.id)?,
            mailbox_id: parse_id("envelopes.mailbox_id", &self.mailbox_id)?,
            from: self.sender,
            to: self.recipient,
            subject: self.subject,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttachmentRow {
    id: String,
    envelope_id: String,
    filename: String,
    size: i64,
}

impl AttachmentRow {
    fn try_into_attachment(self) -> Result<Attachment, StoreError> {
        Ok(Attachment {
            id: parse_id("attachments.id", &self.id)?,
            envelope_id: parse_id("attachments.envelope_id", &self.envelope_id)?,
            filename: self.filename,
            size: self.size,
        })
    }
}

/// A looked-up row plus whether the requested owner holds it.
#[derive(FromRow)]
struct MailboxLookupRow {
    #[sqlx(flatten)]
    mailbox: MailboxRow,
    owned: bool,
}

#[derive(FromRow)]
struct EnvelopeLookupRow {
    #[sqlx(flatten)]
    envelope: EnvelopeRow,
    owned: bool,
}

#[async_trait]
impl MailboxStore for PgStore {
    async fn insert_mailbox(&self, mailbox: &Mailbox) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mailboxes (id, user_id, address, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(mailbox.id.to_string())
        .bind(mailbox.user_id.to_string())
        .bind(&mailbox.address)
        .bind(mailbox.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn list_mailboxes(&self, owner: OwnedBy) -> Result<Vec<Mailbox>, StoreError> {
        let rows: Vec<MailboxRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, address, created_at
            FROM mailboxes
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(MailboxRow::try_into_mailbox).collect()
    }

    async fn find_mailbox(
        &self,
        address: &str,
        owner: OwnedBy,
    ) -> Result<Lookup<Mailbox>, StoreError> {
        let row: Option<MailboxLookupRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, address, created_at, user_id = $2 AS owned
            FROM mailboxes
            WHERE address = $1
            "#,
        )
        .bind(address)
        .bind(owner.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(match row {
            Some(r) if r.owned => Lookup::Owned(r.mailbox.try_into_mailbox()?),
            Some(_) => Lookup::Foreign,
            None => Lookup::Missing,
        })
    }

    async fn list_envelopes(
        &self,
        mailbox: MailboxId,
        owner: OwnedBy,
    ) -> Result<Vec<Envelope>, StoreError> {
        let rows: Vec<EnvelopeRow> = sqlx::query_as(
            r#"
            SELECT e.id, e.mailbox_id, e.sender, e.recipient, e.subject, e.content, e.created_at
            FROM envelopes e
            JOIN mailboxes m ON m.id = e.mailbox_id
            WHERE e.mailbox_id = $1 AND m.user_id = $2
            ORDER BY e.created_at DESC, e.id DESC
            "#,
        )
        .bind(mailbox.to_string())
        .bind(owner.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(EnvelopeRow::try_into_envelope).collect()
    }

    async fn find_envelope(
        &self,
        id: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Lookup<Envelope>, StoreError> {
        let row: Option<EnvelopeLookupRow> = sqlx::query_as(
            r#"
            SELECT e.id, e.mailbox_id, e.sender, e.recipient, e.subject, e.content, e.created_at,
                   m.user_id = $2 AS owned
            FROM envelopes e
            JOIN mailboxes m ON m.id = e.mailbox_id
            WHERE e.id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(owner.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(match row {
            Some(r) if r.owned => Lookup::Owned(r.envelope.try_into_envelope()?),
            Some(_) => Lookup::Foreign,
            None => Lookup::Missing,
        })
    }

    async fn list_attachments(
        &self,
        envelope: EnvelopeId,
        owner: OwnedBy,
    ) -> Result<Vec<Attachment>, StoreError> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.envelope_id, a.filename, a.size
            FROM attachments a
            JOIN envelopes e ON e.id = a.envelope_id
            JOIN mailboxes m ON m.id = e.mailbox_id
            WHERE a.envelope_id = $1 AND m.user_id = $2
            ORDER BY a.id
            "#,
        )
        .bind(envelope.to_string())
        .bind(owner.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter()
            .map(AttachmentRow::try_into_attachment)
            .collect()
    }
}
