//! HTTP routing for the tmail API.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::mailbox;

/// Builds the API router.
///
/// Every route sits behind [`auth::attach_identity`]; handlers that need a
/// caller ask for it with [`auth::RequireAuth`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Login
        .route("/api/auth/url", get(auth::routes::auth_url))
        .route("/api/auth/login", post(auth::routes::login))
        .route("/api/profile", get(auth::routes::profile))
        // API tokens
        .route(
            "/api/tokens",
            get(auth::routes::list_tokens).post(auth::routes::issue_token),
        )
        .route("/api/tokens/{id}", delete(auth::routes::revoke_token))
        // Mailboxes
        .route("/api/mailbox", post(mailbox::create_mailbox))
        .route("/api/mailboxes", get(mailbox::list_mailboxes))
        .route("/api/emails", get(mailbox::list_emails))
        .route("/api/email/{id}", get(mailbox::get_email))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::attach_identity,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
