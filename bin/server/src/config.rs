//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`GITHUB__CLIENT_ID`, `AUTH__MAILBOX_DOMAIN`).

use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// GitHub OAuth application settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Token, mailbox and login-state settings.
    #[serde(default)]
    pub auth: AuthSettings,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// GitHub OAuth application settings.
///
/// Client id, secret and redirect URI have no defaults; the provider client
/// refuses to start without them.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// Callback URL registered with the OAuth application.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Space-separated scopes to request.
    #[serde(default = "default_scopes")]
    pub scopes: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Base URL of the REST API serving `/user`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bound on every outbound call to GitHub, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_scopes() -> String {
    "user:email".to_string()
}

fn default_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl GithubConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scopes: default_scopes(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            api_url: default_api_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Identity-layer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Domain of generated mailbox addresses.
    #[serde(default = "default_mailbox_domain")]
    pub mailbox_domain: String,

    /// How long an OAuth `state` stays redeemable, in seconds.
    #[serde(default = "default_login_state_ttl_seconds")]
    pub login_state_ttl_seconds: i64,

    /// Interval between expired login-state cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Label given to the token issued at login.
    #[serde(default = "default_token_label")]
    pub default_token_label: String,
}

fn default_mailbox_domain() -> String {
    "mail.4w.ink".to_string()
}

fn default_login_state_ttl_seconds() -> i64 {
    600
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_token_label() -> String {
    "default".to_string()
}

impl AuthSettings {
    #[must_use]
    pub fn login_state_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.login_state_ttl_seconds)
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mailbox_domain: default_mailbox_domain(),
            login_state_ttl_seconds: default_login_state_ttl_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            default_token_label: default_token_label(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects durations the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the offending key.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.github.timeout_seconds == 0 {
            return Err(invalid("github.timeout_seconds must be positive"));
        }
        if self.auth.login_state_ttl_seconds <= 0 {
            return Err(invalid("auth.login_state_ttl_seconds must be positive"));
        }
        if self.auth.cleanup_interval_seconds == 0 {
            return Err(invalid("auth.cleanup_interval_seconds must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> config::ConfigError {
    config::ConfigError::Message(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_settings_have_correct_defaults() {
        let settings = AuthSettings::default();
        assert_eq!(settings.mailbox_domain, "mail.4w.ink");
        assert_eq!(settings.login_state_ttl(), chrono::Duration::minutes(10));
        assert_eq!(settings.cleanup_interval_seconds, 300);
        assert_eq!(settings.default_token_label, "default");
    }

    #[test]
    fn github_defaults_point_at_github() {
        let config = GithubConfig::default();
        assert_eq!(config.scopes, "user:email");
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.client_id.is_none());
    }

    #[test]
    fn nested_keys_deserialize_with_defaults() {
        let config: ServerConfig = config::Config::builder()
            .set_override("database_url", "postgres://localhost/tmail")
            .and_then(|b| b.set_override("github.client_id", "abc"))
            .and_then(|b| b.set_override("auth.mailbox_domain", "mail.example.com"))
            .expect("overrides")
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.github.client_id.as_deref(), Some("abc"));
        assert_eq!(config.github.token_url, default_token_url());
        assert_eq!(config.auth.mailbox_domain, "mail.example.com");
        assert_eq!(config.auth.default_token_label, "default");
        config.validate().expect("defaults are valid");
    }

    fn with_override(key: &str, value: i64) -> ServerConfig {
        config::Config::builder()
            .set_override("database_url", "postgres://localhost/tmail")
            .and_then(|b| b.set_override(key, value))
            .expect("overrides")
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize")
    }

    #[test]
    fn zero_or_negative_durations_are_rejected() {
        for (key, value) in [
            ("github.timeout_seconds", 0),
            ("auth.login_state_ttl_seconds", 0),
            ("auth.login_state_ttl_seconds", -60),
            ("auth.cleanup_interval_seconds", 0),
        ] {
            let err = with_override(key, value)
                .validate()
                .expect_err("invalid duration");
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }
}
