//! GitHub OAuth client.
//!
//! Handles the authorization-code flow against GitHub:
//! - builds the authorization URL carrying the caller's `state`
//! - exchanges the callback `code` for an access token
//! - fetches the `/user` profile with that token

use async_trait::async_trait;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use tmail_identity::{ExternalAuthError, IdentityProvider, ProviderProfile};
use tracing::{debug, instrument};

use crate::config::GithubConfig;

/// User agent sent to the GitHub API, which rejects requests without one.
const CLIENT_USER_AGENT: &str = "tmail-server";

/// Media type for GitHub REST responses.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// OAuth client with the authorization and token endpoints set.
type GithubOAuth =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// GitHub identity provider.
pub struct GithubClient {
    oauth: GithubOAuth,
    scopes: Vec<Scope>,
    profile_url: String,
    http: reqwest::Client,
}

impl GithubClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails with `NotConfigured` if client id, client secret or redirect
    /// URI is missing or blank, and with `InvalidConfiguration` if an
    /// endpoint URL does not parse.
    pub fn new(config: &GithubConfig) -> tmail_core::Result<Self, ExternalAuthError> {
        let client_id = required("client_id", config.client_id.as_deref())?;
        let client_secret = required("client_secret", config.client_secret.as_deref())?;
        let redirect_uri = required("redirect_uri", config.redirect_uri.as_deref())?;

        let auth_url = AuthUrl::new(config.authorize_url.clone())
            .map_err(|e| invalid("authorize_url", &e))?;
        let token_url =
            TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token_url", &e))?;
        let redirect_url =
            RedirectUrl::new(redirect_uri.to_string()).map_err(|e| invalid("redirect_uri", &e))?;

        let oauth = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExternalAuthError::InvalidConfiguration {
                field: "timeout_seconds",
                reason: e.to_string(),
            })?;

        Ok(Self {
            oauth,
            scopes: config
                .scopes
                .split_whitespace()
                .map(|s| Scope::new(s.to_string()))
                .collect(),
            profile_url: format!("{}/user", config.api_url.trim_end_matches('/')),
            http,
        })
    }
}

fn required<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ExternalAuthError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ExternalAuthError::NotConfigured { field }),
    }
}

fn invalid(field: &'static str, err: &impl std::fmt::Display) -> ExternalAuthError {
    ExternalAuthError::InvalidConfiguration {
        field,
        reason: err.to_string(),
    }
}

/// Walks the source chain looking for a reqwest timeout.
///
/// The oauth2 client wraps reqwest errors in a `Box`, so both shapes are
/// checked.
fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let reqwest_err = e
            .downcast_ref::<reqwest::Error>()
            .or_else(|| e.downcast_ref::<Box<reqwest::Error>>().map(|boxed| &**boxed));
        if reqwest_err.is_some_and(reqwest::Error::is_timeout) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Joins an error with its sources: `outer: inner: root`.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut reason = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        reason.push_str(": ");
        reason.push_str(&e.to_string());
        current = e.source();
    }
    reason
}

fn request_failed(endpoint: &str, err: &(dyn std::error::Error + 'static)) -> ExternalAuthError {
    if is_timeout(err) {
        ExternalAuthError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        ExternalAuthError::Request {
            endpoint: endpoint.to_string(),
            reason: describe(err),
        }
    }
}

#[async_trait]
impl IdentityProvider for GithubClient {
    fn authorization_url(&self, state: &str) -> String {
        let (url, _) = self
            .oauth
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.scopes.iter().cloned())
            .url();
        url.to_string()
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> tmail_core::Result<String, ExternalAuthError> {
        let endpoint = self.oauth.token_uri().as_str();
        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| request_failed(endpoint, &e))?;

        let access_token = response.access_token().secret();
        if access_token.is_empty() {
            return Err(ExternalAuthError::MissingAccessToken.into());
        }
        debug!("Exchanged authorization code");
        Ok(access_token.clone())
    }

    #[instrument(skip_all)]
    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> tmail_core::Result<ProviderProfile, ExternalAuthError> {
        let endpoint = self.profile_url.as_str();
        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await
            .map_err(|e| request_failed(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalAuthError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let profile: ProviderProfile = response.json().await.map_err(|e| {
            ExternalAuthError::MalformedProfile {
                reason: e.to_string(),
            }
        })?;
        if !profile.is_identified() {
            return Err(ExternalAuthError::MalformedProfile {
                reason: "profile has no account id".to_string(),
            }
            .into());
        }
        debug!(login = %profile.login, "Fetched provider profile");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TOKEN_PATH: &str = "/login/oauth/access_token";

    /// Serves every request with `status` and a JSON `body` after `delay`.
    async fn canned_server(status: &'static str, body: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(respond(socket, status, body, delay));
            }
        });
        format!("http://{addr}")
    }

    async fn respond(mut socket: TcpStream, status: &str, body: &str, delay: Duration) {
        // Drain the request first; closing with unread bytes resets the connection.
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request_complete(&request) {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    fn client_for(base: &str, timeout_seconds: u64) -> GithubClient {
        GithubClient::new(&GithubConfig {
            token_url: format!("{base}{TOKEN_PATH}"),
            api_url: base.to_string(),
            timeout_seconds,
            ..config()
        })
        .expect("configured")
    }

    async fn exchange(
        status: &'static str,
        body: &'static str,
    ) -> tmail_core::Result<String, ExternalAuthError> {
        let base = canned_server(status, body, Duration::ZERO).await;
        client_for(&base, 5).exchange_code("code").await
    }

    async fn profile(
        status: &'static str,
        body: &'static str,
    ) -> tmail_core::Result<ProviderProfile, ExternalAuthError> {
        let base = canned_server(status, body, Duration::ZERO).await;
        client_for(&base, 5).fetch_profile("gho_x").await
    }

    fn config() -> GithubConfig {
        GithubConfig {
            client_id: Some("Iv1.abc123".to_string()),
            client_secret: Some("shh".to_string()),
            redirect_uri: Some("https://tmail.example.com/callback".to_string()),
            ..GithubConfig::default()
        }
    }

    #[test]
    fn authorization_url_carries_client_scope_and_state() {
        let client = GithubClient::new(&config()).expect("configured");

        let url = client.authorization_url("xyz");

        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=Iv1.abc123"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("scope=user%3Aemail"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Ftmail.example.com%2Fcallback"));
    }

    #[test]
    fn missing_or_blank_settings_fail_fast() {
        let mut missing = config();
        missing.client_secret = None;
        let err = GithubClient::new(&missing).err().expect("missing secret");
        assert_eq!(
            *err.current_context(),
            ExternalAuthError::NotConfigured {
                field: "client_secret"
            }
        );

        let mut blank = config();
        blank.client_id = Some("  ".to_string());
        let err = GithubClient::new(&blank).err().expect("blank id");
        assert_eq!(
            *err.current_context(),
            ExternalAuthError::NotConfigured { field: "client_id" }
        );
    }

    #[test]
    fn unparsable_endpoint_is_invalid_configuration() {
        let mut bad = config();
        bad.token_url = "not a url".to_string();
        let err = GithubClient::new(&bad).err().expect("bad url");
        assert!(matches!(
            err.current_context(),
            ExternalAuthError::InvalidConfiguration {
                field: "token_url",
                ..
            }
        ));
    }

    #[test]
    fn profile_url_joins_api_base() {
        let mut custom = config();
        custom.api_url = "https://github.example.com/api/v3/".to_string();
        let client = GithubClient::new(&custom).expect("configured");
        assert_eq!(client.profile_url, "https://github.example.com/api/v3/user");
    }

    #[tokio::test]
    async fn exchange_returns_the_access_token() {
        let token = exchange(
            "200 OK",
            r#"{"access_token":"gho_x","token_type":"bearer","scope":"user:email"}"#,
        )
        .await
        .expect("token");
        assert_eq!(token, "gho_x");
    }

    #[tokio::test]
    async fn rejected_code_is_an_external_error() {
        // GitHub reports a bad code with a 200 and an error body.
        let err = exchange(
            "200 OK",
            r#"{"error":"bad_verification_code","error_description":"expired"}"#,
        )
        .await
        .expect_err("bad code");
        assert!(matches!(err.current_context(), ExternalAuthError::Request { .. }));

        let err = exchange("400 Bad Request", r#"{"error":"invalid_grant"}"#)
            .await
            .expect_err("bad request");
        assert!(matches!(err.current_context(), ExternalAuthError::Request { .. }));
    }

    #[tokio::test]
    async fn missing_or_empty_access_token_is_rejected() {
        let err = exchange("200 OK", r#"{"access_token":"","token_type":"bearer"}"#)
            .await
            .expect_err("empty token");
        assert_eq!(*err.current_context(), ExternalAuthError::MissingAccessToken);

        let err = exchange("200 OK", r#"{"token_type":"bearer"}"#)
            .await
            .expect_err("no token");
        assert!(matches!(err.current_context(), ExternalAuthError::Request { .. }));
    }

    #[tokio::test]
    async fn slow_token_endpoint_times_out() {
        let base = canned_server("200 OK", "{}", Duration::from_millis(2500)).await;
        let err = client_for(&base, 1)
            .exchange_code("code")
            .await
            .expect_err("slow");
        assert_eq!(
            *err.current_context(),
            ExternalAuthError::Timeout {
                endpoint: format!("{base}{TOKEN_PATH}")
            }
        );
    }

    #[tokio::test]
    async fn slow_profile_endpoint_times_out() {
        let base = canned_server("200 OK", "{}", Duration::from_millis(2500)).await;
        let err = client_for(&base, 1)
            .fetch_profile("gho_x")
            .await
            .expect_err("slow");
        assert_eq!(
            *err.current_context(),
            ExternalAuthError::Timeout {
                endpoint: format!("{base}/user")
            }
        );
    }

    #[tokio::test]
    async fn profile_is_parsed_with_null_fields_as_empty() {
        let fetched = profile(
            "200 OK",
            r#"{"id":12345,"login":"alice","avatar_url":"https://a.test/1","email":null}"#,
        )
        .await
        .expect("profile");
        assert_eq!(fetched.id, 12345);
        assert_eq!(fetched.login, "alice");
        assert_eq!(fetched.email, "");
    }

    #[tokio::test]
    async fn non_success_profile_status_is_rejected() {
        let err = profile("401 Unauthorized", r#"{"message":"Bad credentials"}"#)
            .await
            .expect_err("unauthorized");
        assert!(matches!(
            err.current_context(),
            ExternalAuthError::Status { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn unusable_profile_bodies_are_malformed() {
        for body in ["not json", "{}", r#"{"id":0,"login":"ghost"}"#] {
            let err = profile("200 OK", body).await.expect_err("malformed");
            assert!(
                matches!(
                    err.current_context(),
                    ExternalAuthError::MalformedProfile { .. }
                ),
                "body {body}"
            );
        }
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_external_error() {
        let mut offline = config();
        offline.api_url = "http://127.0.0.1:1".to_string();
        let client = GithubClient::new(&offline).expect("configured");

        let err = client
            .fetch_profile("token")
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(
            err.current_context(),
            ExternalAuthError::Request { .. } | ExternalAuthError::Timeout { .. }
        ));
    }
}
