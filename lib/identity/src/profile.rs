//! Profile returned by the external identity provider.

use serde::{Deserialize, Serialize};

/// The provider's view of the person logging in.
///
/// Field names follow the GitHub `/user` payload. Nullable provider fields
/// deserialize to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Numeric provider account id.
    #[serde(default)]
    pub id: i64,
    /// Login handle.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub login: String,
    /// Avatar image URL.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub avatar_url: String,
    /// Public email; empty when the user keeps it private.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    /// Free-form display name.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

impl ProviderProfile {
    /// The stable external identity key: the provider id as a string.
    #[must_use]
    pub fn external_id(&self) -> String {
        self.id.to_string()
    }

    /// Returns true if the profile identifies an account.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.id > 0
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
