//! Mailbox and email routes. Every handler here requires an identity and
//! reads only through the ownership guard.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use tmail_core::EnvelopeId;
use tmail_identity::{Attachment, Envelope, Mailbox};

use crate::auth::{AppState, RequireAuth};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct EmailsQuery {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct MailboxView<'a> {
    email: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Mailbox> for MailboxView<'a> {
    fn from(mailbox: &'a Mailbox) -> Self {
        Self {
            email: &mailbox.address,
            created_at: mailbox.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct EnvelopeSummary<'a> {
    id: String,
    from: &'a str,
    subject: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Envelope> for EnvelopeSummary<'a> {
    fn from(envelope: &'a Envelope) -> Self {
        Self {
            id: envelope.id.to_string(),
            from: &envelope.from,
            subject: &envelope.subject,
            created_at: envelope.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct AttachmentView<'a> {
    id: String,
    filename: &'a str,
    size: i64,
}

impl<'a> From<&'a Attachment> for AttachmentView<'a> {
    fn from(attachment: &'a Attachment) -> Self {
        Self {
            id: attachment.id.to_string(),
            filename: &attachment.filename,
            size: attachment.size,
        }
    }
}

/// Creates a new mailbox for the caller.
pub async fn create_mailbox(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Value>, ApiError> {
    let mailbox = state.mailboxes().create(&identity).await?;
    Ok(Json(json!(MailboxView::from(&mailbox))))
}

/// Lists the caller's mailboxes.
pub async fn list_mailboxes(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Value>, ApiError> {
    let mailboxes = state.mailboxes().list(&identity).await?;
    let views: Vec<MailboxView<'_>> = mailboxes.iter().map(MailboxView::from).collect();
    Ok(Json(json!({ "mailboxes": views })))
}

/// Lists emails received by one of the caller's mailboxes.
pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    Query(query): Query<EmailsQuery>,
) -> Result<Json<Value>, ApiError> {
    let address = query
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing email"))?;

    let envelopes = state.guard().envelopes(&identity, &address).await?;
    let emails: Vec<EnvelopeSummary<'_>> = envelopes.iter().map(EnvelopeSummary::from).collect();
    Ok(Json(json!({ "emails": emails })))
}

/// Returns one email with its attachments.
pub async fn get_email(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let envelope_id = EnvelopeId::from_str(&id).map_err(|_| ApiError::not_found("email"))?;
    let (envelope, attachments) = state.guard().envelope(&identity, envelope_id).await?;
    let attachments: Vec<AttachmentView<'_>> =
        attachments.iter().map(AttachmentView::from).collect();

    Ok(Json(json!({
        "id": envelope.id.to_string(),
        "from": envelope.from,
        "to": envelope.to,
        "subject": envelope.subject,
        "content": envelope.content,
        "created_at": envelope.created_at,
        "attachments": attachments,
    })))
}
