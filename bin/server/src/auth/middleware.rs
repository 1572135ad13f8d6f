//! Identity middleware and extractors for Axum.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tmail_identity::{AuthError, BearerError, Identity, IdentityError, parse_bearer};
use tracing::{debug, error};

use super::AppState;

/// Outcome of resolving the request's bearer header, stored in the request
/// extensions by [`attach_identity`].
#[derive(Debug, Clone)]
pub struct ResolvedIdentity(pub Result<Identity, AuthRejection>);

/// Resolves the bearer header once and records the outcome for the
/// extractors. Never rejects: unauthenticated requests pass through.
pub async fn attach_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = resolve(&state, request.headers()).await;
    if let Ok(identity) = &resolved {
        debug!(user_id = %identity.user_id(), "Attached identity");
    }
    request.extensions_mut().insert(ResolvedIdentity(resolved));
    next.run(request).await
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<Identity, AuthRejection> {
    let header = headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());
    let secret = parse_bearer(header)?;

    state.tokens().validate(secret).await.map_err(|err| match err {
        IdentityError::Auth(AuthError::Revoked) => AuthRejection::TokenRevoked,
        IdentityError::Auth(_) => AuthRejection::InvalidToken,
        other => {
            error!(error = %other, "Failed to validate API token");
            AuthRejection::InternalError
        }
    })
}

async fn resolved_for(parts: &Parts, state: &AppState) -> Result<Identity, AuthRejection> {
    match parts.extensions.get::<ResolvedIdentity>() {
        Some(ResolvedIdentity(resolved)) => resolved.clone(),
        None => resolve(state, &parts.headers).await,
    }
}

/// Extractor for requiring an authenticated caller.
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        resolved_for(parts, &app_state).await.map(RequireAuth)
    }
}

/// Extractor for optionally getting the authenticated caller.
///
/// Any failure, including a store outage, yields `None`.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        Ok(OptionalAuth(resolved_for(parts, &app_state).await.ok()))
    }
}

/// Rejection type for the identity extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    MalformedHeader,
    InvalidToken,
    TokenRevoked,
    InternalError,
}

impl From<BearerError> for AuthRejection {
    fn from(err: BearerError) -> Self {
        match err {
            BearerError::Missing => Self::MissingHeader,
            BearerError::Malformed => Self::MalformedHeader,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingHeader => (StatusCode::UNAUTHORIZED, "missing authorization header"),
            Self::MalformedHeader => (StatusCode::UNAUTHORIZED, "invalid authorization header"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, AuthError::InvalidToken.reason()),
            Self::TokenRevoked => (StatusCode::UNAUTHORIZED, AuthError::Revoked.reason()),
            Self::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
