//! Authentication routes: login, profile and API token management.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use tmail_core::ApiTokenId;
use tmail_identity::{ApiToken, User, complete_login};
use tracing::debug;

use super::{AppState, OptionalAuth, RequireAuth};
use crate::error::ApiError;

/// Query parameters for building the authorization URL.
#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    state: Option<String>,
}

/// Query parameters for completing a login.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Body of a token issuance request.
#[derive(Debug, Default, Deserialize)]
pub struct IssueTokenRequest {
    label: Option<String>,
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserView {
    id: String,
    username: String,
    avatar: String,
    email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            username: user.username().to_string(),
            avatar: user.avatar_url().to_string(),
            email: user.email().to_string(),
        }
    }
}

/// Token metadata; never includes the secret.
#[derive(Debug, Serialize)]
pub struct TokenView {
    id: String,
    label: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked: bool,
}

impl From<&ApiToken> for TokenView {
    fn from(token: &ApiToken) -> Self {
        Self {
            id: token.id().to_string(),
            label: token.label().to_string(),
            created_at: token.created_at(),
            last_used_at: token.last_used_at(),
            revoked: token.is_revoked(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Returns the provider authorization URL for the caller's `state`.
///
/// The state is remembered so the login can check it came from here.
/// Oversized states are rejected as invalid.
pub async fn auth_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthUrlQuery>,
) -> Result<Json<Value>, ApiError> {
    let csrf = non_empty(query.state).ok_or_else(|| ApiError::bad_request("missing state"))?;
    state.login_states().remember(&csrf).await?;

    Ok(Json(json!({ "auth_url": state.provider.authorization_url(&csrf) })))
}

/// Completes the OAuth flow and returns the user with a new API token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    OptionalAuth(current): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Json<Value>, ApiError> {
    let code = non_empty(query.code).ok_or_else(|| ApiError::bad_request("missing code"))?;
    let csrf = non_empty(query.state).ok_or_else(|| ApiError::bad_request("missing state"))?;
    if let Some(identity) = current {
        debug!(user_id = %identity.user_id(), "Authenticated caller is logging in again");
    }

    state.login_states().consume(&csrf).await?;
    let outcome = complete_login(
        state.provider.as_ref(),
        state.store.clone(),
        &code,
        &state.settings.default_token_label,
    )
    .await?;

    Ok(Json(json!({
        "user": UserView::from(&outcome.user),
        "api_token": outcome.issued.secret.as_str(),
    })))
}

/// Returns the caller's profile.
pub async fn profile(RequireAuth(identity): RequireAuth) -> Json<UserView> {
    Json(UserView::from(identity.user()))
}

/// Lists the caller's API tokens.
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Value>, ApiError> {
    let tokens = state.tokens().list(identity.user_id()).await?;
    let tokens: Vec<TokenView> = tokens.iter().map(TokenView::from).collect();
    Ok(Json(json!({ "tokens": tokens })))
}

/// Issues an additional API token for the caller.
///
/// The body is optional; without a label the configured default is used.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: IssueTokenRequest = if body.is_empty() {
        IssueTokenRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| ApiError::bad_request("invalid request body"))?
    };
    let label = non_empty(request.label)
        .unwrap_or_else(|| state.settings.default_token_label.clone());

    let issued = state.tokens().issue(identity.user_id(), &label).await?;

    Ok(Json(json!({
        "token": TokenView::from(&issued.token),
        "api_token": issued.secret.as_str(),
    })))
}

/// Revokes one of the caller's API tokens.
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let token_id = ApiTokenId::from_str(&id).map_err(|_| ApiError::not_found("token"))?;
    let token = state.tokens().revoke(token_id, identity.user_id()).await?;
    Ok(Json(json!({ "token": TokenView::from(&token) })))
}
