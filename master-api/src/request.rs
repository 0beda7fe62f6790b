//! Request templates and the descriptors handed to a transport
use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::{
    header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    merge::merge,
    profile::{deserialize_secretstring, serialize_secretstring, ConnectionProfile},
    Error, Result,
};

/// Content type of json bodies
pub const JSON_MIME: &str = "application/json";

/// A per-call request before the connection profile is merged in
#[derive(Clone, Debug, Serialize)]
pub struct RequestTemplate {
    /// Path and query relative to the profile's base
    pub path: String,
    /// Http method
    #[serde(with = "method")]
    pub method: Method,
    /// Headers taking precedence over the profile's headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Json body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Basic auth credentials as `user:pass`
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_secretstring")]
    pub auth: Option<SecretString>,
}

impl RequestTemplate {
    /// New template for `method` on `path`
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self {
            path: path.into(),
            method,
            headers: None,
            body: None,
            auth: None,
        }
    }

    /// New GET template
    pub fn get<S: Into<String>>(path: S) -> Self {
        Self::new(Method::GET, path)
    }

    /// Add a header
    #[must_use]
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Add several headers
    #[must_use]
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.get_or_insert_with(BTreeMap::new).extend(headers);
        self
    }

    /// Authenticate with basic auth
    #[must_use]
    pub fn basic_auth(mut self, username: &str, password: &SecretString) -> Self {
        self.auth = Some(format!("{username}:{}", password.expose_secret()).into());
        self
    }

    /// Merge `profile` into this template.
    ///
    /// See [`merge`](crate::merge::merge) for the precedence rules.
    pub fn merge(self, profile: &ConnectionProfile) -> Result<RequestDescriptor> {
        let mut target = serde_json::to_value(&self)?;
        merge(&mut target, &profile.merge_source()?);
        let descriptor: RequestDescriptor = serde_json::from_value(target)?;
        tracing::debug!(method = %descriptor.method, path = %descriptor.path, "built request descriptor");
        Ok(descriptor)
    }
}

/// A fully resolved request, ready for a transport
///
/// Descriptors are owned snapshots: later changes to the profile they were built
/// from do not reach them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Scheme and authority of the master API, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Path and query
    pub path: String,
    /// Http method
    #[serde(with = "method")]
    pub method: Method,
    /// Merged headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Json body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Basic auth credentials as `user:pass`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub auth: Option<SecretString>,
}

impl RequestDescriptor {
    /// A descriptor for an absolute url that is not merged with any profile
    pub fn from_url(url: &str, method: Method) -> Result<Self> {
        let uri: http::Uri = url.parse()?;
        let origin = match (uri.scheme_str(), uri.authority()) {
            (Some(scheme), Some(authority)) => Some(format!("{scheme}://{authority}")),
            _ => None,
        };
        let path = uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());
        Ok(Self {
            url: origin,
            path,
            method,
            headers: BTreeMap::new(),
            body: None,
            auth: None,
        })
    }

    /// Look up a header by exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Remove a header by exact name
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// The url to dispatch to: `url` joined with `path`
    pub fn uri(&self) -> String {
        match &self.url {
            Some(url) => {
                let url = url.trim_end_matches('/');
                if self.path.starts_with('/') {
                    format!("{url}{}", self.path)
                } else {
                    format!("{url}/{}", self.path)
                }
            }
            None => self.path.clone(),
        }
    }

    /// Convert into an [`http::Request`] for a transport
    ///
    /// Basic auth credentials only become an `Authorization` header when no
    /// other `Authorization` header is present.
    pub fn to_http_request(&self) -> Result<http::Request<Vec<u8>>> {
        let body = match &self.body {
            Some(body) => serde_json::to_vec(body)?,
            None => vec![],
        };
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri())
            .body(body)
            .map_err(Error::HttpError)?;

        let headers = req.headers_mut();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
            let mut value = HeaderValue::from_str(value).map_err(http::Error::from)?;
            if name == AUTHORIZATION {
                value.set_sensitive(true);
            }
            headers.insert(name, value);
        }
        if let Some(auth) = &self.auth {
            if !headers.contains_key(AUTHORIZATION) {
                let encoded = STANDARD.encode(auth.expose_secret());
                let mut value = HeaderValue::try_from(format!("Basic {encoded}")).map_err(http::Error::from)?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        if self.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME));
        }
        Ok(req)
    }
}

/// (De)serialize an [`http::Method`] as its name
mod method {
    use http::Method;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let name = String::deserialize(deserializer)?;
        Method::from_bytes(name.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::{RequestDescriptor, RequestTemplate, JSON_MIME};
    use crate::ConnectionProfile;
    use assert_json_diff::assert_json_eq;
    use http::{header, Method};
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("https://host")
            .with_path("/base")
            .with_header("X", "1")
    }

    #[test]
    fn merges_profile_into_template() {
        let descriptor = RequestTemplate::get("/api/v1/pods?watch=true")
            .merge(&profile())
            .unwrap();
        assert_eq!(descriptor.path, "/base/api/v1/pods?watch=true");
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.url.as_deref(), Some("https://host"));
        assert_eq!(descriptor.header("X"), Some("1"));
        assert_eq!(descriptor.headers.len(), 1);
    }

    #[test]
    fn template_headers_take_precedence() {
        let profile = profile().with_header("Accept", "application/json");
        let descriptor = RequestTemplate::get("/api")
            .header("Accept", "text/plain")
            .merge(&profile)
            .unwrap();
        assert_eq!(descriptor.header("Accept"), Some("text/plain"));
        assert_eq!(descriptor.header("X"), Some("1"));
    }

    #[test]
    fn descriptor_serializes_without_empty_fields() {
        let descriptor = RequestTemplate::get("/api").merge(&profile()).unwrap();
        assert_json_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "url": "https://host",
                "path": "/base/api",
                "method": "GET",
                "headers": { "X": "1" },
            })
        );
    }

    #[test]
    fn http_request_carries_basic_auth() {
        let password: SecretString = "pass".to_string().into();
        let descriptor = RequestTemplate::get("/oauth/authorize?response_type=token")
            .basic_auth("user", &password)
            .header("X-Csrf-Token", "1")
            .merge(&ConnectionProfile::new("https://host/"))
            .unwrap();
        assert_eq!(descriptor.auth.as_ref().unwrap().expose_secret(), "user:pass");

        let req = descriptor.to_http_request().unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri(), "https://host/oauth/authorize?response_type=token");
        assert_eq!(req.headers()["x-csrf-token"], "1");
        let auth = &req.headers()[header::AUTHORIZATION];
        assert_eq!(auth, "Basic dXNlcjpwYXNz");
        assert!(auth.is_sensitive());
        assert!(req.body().is_empty());
    }

    #[test]
    fn bearer_header_wins_over_basic_auth() {
        let password: SecretString = "pass".to_string().into();
        let profile = ConnectionProfile::new("https://host").with_header("Authorization", "Bearer t");
        let req = RequestTemplate::get("/")
            .basic_auth("user", &password)
            .merge(&profile)
            .unwrap()
            .to_http_request()
            .unwrap();
        assert_eq!(req.headers()[header::AUTHORIZATION], "Bearer t");
        assert!(req.headers()[header::AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn json_body_sets_content_type() {
        let mut descriptor = RequestDescriptor::from_url("https://sso/token", Method::POST).unwrap();
        descriptor.body = Some(json!({ "grant_type": "refresh_token" }));
        let req = descriptor.to_http_request().unwrap();
        assert_eq!(req.headers()[header::CONTENT_TYPE], JSON_MIME);
        assert_eq!(req.body(), br#"{"grant_type":"refresh_token"}"#);
    }

    #[test]
    fn from_url_splits_origin() {
        let descriptor =
            RequestDescriptor::from_url("https://sso.example.com:8443/realms/x/token?a=1", Method::POST).unwrap();
        assert_eq!(descriptor.url.as_deref(), Some("https://sso.example.com:8443"));
        assert_eq!(descriptor.path, "/realms/x/token?a=1");
        assert_eq!(descriptor.uri(), "https://sso.example.com:8443/realms/x/token?a=1");

        let descriptor = RequestDescriptor::from_url("https://sso.example.com", Method::GET).unwrap();
        assert_eq!(descriptor.path, "/");

        let descriptor = RequestDescriptor::from_url("/relative", Method::GET).unwrap();
        assert_eq!(descriptor.url, None);
        assert_eq!(descriptor.uri(), "/relative");

        RequestDescriptor::from_url("not a url", Method::GET).unwrap_err();
    }

    #[test]
    fn invalid_header_value_is_an_error() {
        let descriptor = RequestTemplate::get("/")
            .header("X", "line\nbreak")
            .merge(&ConnectionProfile::new("https://host"))
            .unwrap();
        assert!(matches!(descriptor.to_http_request(), Err(crate::Error::HttpError(_))));
    }
}
