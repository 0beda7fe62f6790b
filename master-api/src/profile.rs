//! Connection profile shared by every request built against one master API.
//!
//! A [`ConnectionProfile`] is owned by the caller and handed to a [`Client`](crate::Client)
//! as a [`SharedProfile`]. The client never copies it: header and token changes made
//! through any handle are seen by every descriptor built afterwards.
use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{error::ConfigError, Result};

/// Header carrying the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

/// A [`ConnectionProfile`] shared between the caller and a [`Client`](crate::Client).
///
/// Descriptor construction takes a read lock for the duration of a merge,
/// token assignment takes a write lock.
pub type SharedProfile = Arc<RwLock<ConnectionProfile>>;

/// Base connection and auth configuration merged into every request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    /// Base endpoint of the master API, e.g. `https://cluster.example.com:8443`
    pub url: String,
    /// Base path prepended to every request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Headers added to every request unless the request sets them itself
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// OpenID Connect provider used to obtain and refresh bearer tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProvider>,
}

/// OpenID Connect provider settings and the current bearer token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProvider {
    /// Issuer url of the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// OAuth client id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub client_secret: Option<SecretString>,
    /// Refresh token exchanged for a new bearer token
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub refresh_token: Option<SecretString>,
    /// Current bearer token
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub token: Option<SecretString>,
}

pub(crate) fn serialize_secretstring<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_secretstring<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// The part of a profile that is merged into request templates.
///
/// The auth provider stays out of descriptors; only the header it produced goes in.
#[derive(Serialize)]
struct MergeSource<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    headers: &'a BTreeMap<String, String>,
}

impl ConnectionProfile {
    /// Construct a profile for `url` with no headers and no auth provider
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load a profile from a YAML (or JSON) document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let profile: Self = serde_yaml::from_str(text).map_err(ConfigError::ParseYaml)?;
        if profile.url.is_empty() {
            return Err(ConfigError::EmptyUrl.into());
        }
        Ok(profile)
    }

    /// Set the base path prepended to request paths
    #[must_use]
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a header sent with every request
    #[must_use]
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the auth provider
    #[must_use]
    pub fn with_auth_provider(mut self, provider: AuthProvider) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Wrap the profile for sharing with a [`Client`](crate::Client)
    pub fn into_shared(self) -> SharedProfile {
        Arc::new(RwLock::new(self))
    }

    /// The token currently held by the auth provider, if any
    pub fn token(&self) -> Option<&SecretString> {
        self.auth_provider.as_ref()?.token.as_ref()
    }

    pub(crate) fn merge_source(&self) -> Result<Value> {
        let source = MergeSource {
            url: &self.url,
            path: self.path.as_deref(),
            headers: &self.headers,
        };
        Ok(serde_json::to_value(source)?)
    }
}
