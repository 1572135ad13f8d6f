//! Core identifiers and error handling for tmail.
//!
//! This crate provides the strongly-typed ids shared by the identity layer
//! and the HTTP server, plus the rootcause-based `Result` alias.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ApiTokenId, AttachmentId, EnvelopeId, MailboxId, ParseIdError, UserId};
