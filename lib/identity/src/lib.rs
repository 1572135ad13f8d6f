//! Identity and access control for tmail.
//!
//! Users are minted from an external OAuth login, authenticate API calls
//! with long-lived bearer tokens, and only ever see mailboxes they own.
//!
//! The services here depend only on the record-store traits in [`store`];
//! the server crate supplies a Postgres implementation and tests use
//! [`memory::MemoryStore`].

pub mod account;
pub mod auth;
pub mod error;
pub mod guard;
pub mod login;
pub mod login_state;
pub mod mailbox;
pub mod mailboxes;
pub mod memory;
pub mod profile;
pub mod provider;
pub mod random;
pub mod store;
pub mod token;
pub mod tokens;
pub mod user;

pub use account::AccountResolver;
pub use auth::{BEARER_SCHEME, BearerError, Identity, parse_bearer};
pub use error::{AuthError, ExternalAuthError, IdentityError, StoreError};
pub use guard::OwnershipGuard;
pub use login::{LoginOutcome, complete_login};
pub use login_state::{LoginStates, MAX_STATE_LEN};
pub use mailbox::{Attachment, Envelope, Mailbox};
pub use mailboxes::MailboxService;
pub use memory::MemoryStore;
pub use profile::ProviderProfile;
pub use provider::IdentityProvider;
pub use store::{
    LoginStateStore, Lookup, MailboxStore, OwnedBy, RecordStore, TokenStore, UserStore,
};
pub use token::{ApiToken, IssuedToken, TokenSecret};
pub use tokens::TokenService;
pub use user::User;
