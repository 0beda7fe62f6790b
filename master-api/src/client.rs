//! Descriptor builder for the master API endpoints.
//!
//! A [`Client`] builds [`RequestDescriptor`]s: it never talks to the network. Every
//! operation builds a [`RequestTemplate`] for its endpoint and merges the shared
//! [`ConnectionProfile`](crate::ConnectionProfile) into it.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use form_urlencoded::Serializer;
use http::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{
    params::{ExecParams, LogParams},
    profile::{AuthProvider, SharedProfile, AUTHORIZATION},
    request::{RequestDescriptor, RequestTemplate, JSON_MIME},
    token::TokenState,
    upgrade::{upgrade_headers, StreamProtocol},
    ConnectionProfile, Error, Result,
};

/// Root paths served by OpenShift on top of Kubernetes.
const OPENSHIFT_PATHS: [&str; 2] = ["/oapi", "/oapi/v1"];

/// Username and password for the OpenShift OAuth challenge flows
#[derive(Clone, Debug)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: SecretString,
}

impl Credentials {
    /// Construct credentials from a username and password
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        let password: String = password.into();
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Body of an OAuth refresh token grant
#[derive(Serialize)]
struct RefreshTokenGrant<'a> {
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Builds request descriptors against a shared [`ConnectionProfile`]
///
/// The profile is held by reference: the caller keeps its own [`SharedProfile`]
/// handle and any change made through it shows up in descriptors built afterwards.
#[derive(Debug)]
pub struct Client {
    profile: SharedProfile,
    token: TokenState,
    token_url: Option<String>,
    paths: Vec<String>,
}

impl From<ConnectionProfile> for Client {
    fn from(profile: ConnectionProfile) -> Self {
        Self::new(profile.into_shared())
    }
}

/// Profile and token state
impl Client {
    /// Create a client over a shared profile
    pub fn new(profile: SharedProfile) -> Self {
        Self {
            profile,
            token: TokenState::default(),
            token_url: None,
            paths: vec![],
        }
    }

    /// Handle to the shared profile
    pub fn profile(&self) -> SharedProfile {
        self.profile.clone()
    }

    /// Replace the profile
    ///
    /// Discovered paths and the recorded token expiry belong to the old profile and are dropped.
    pub fn set_profile(&mut self, profile: SharedProfile) {
        self.profile = profile;
        self.paths.clear();
        self.token.clear();
    }

    /// Base url of the master API
    pub fn url(&self) -> String {
        self.profile.read().url.clone()
    }

    /// Point the profile at another base url
    pub fn set_url<S: Into<String>>(&self, url: S) {
        self.profile.write().url = url.into();
    }

    /// Snapshot of the profile's headers
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.profile.read().headers.clone()
    }

    /// Replace the auth provider of the profile and forget the recorded token expiry
    pub fn set_auth_provider(&mut self, provider: Option<AuthProvider>) {
        self.profile.write().auth_provider = provider;
        self.token.clear();
    }

    /// Token endpoint used by [`Client::refresh_token`]
    pub fn token_url(&self) -> Option<&str> {
        self.token_url.as_deref()
    }

    /// Set the token endpoint, usually the `token_endpoint` of the provider's OpenID configuration
    pub fn set_token_url<S: Into<String>>(&mut self, url: S) {
        self.token_url = Some(url.into());
    }

    /// Root paths advertised by the server
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Record the root paths returned by [`Client::get_paths`]
    pub fn set_paths(&mut self, paths: Vec<String>) {
        self.paths = paths;
    }

    /// Whether the server advertised the OpenShift API
    pub fn is_openshift(&self) -> bool {
        self.paths.iter().any(|p| OPENSHIFT_PATHS.contains(&p.as_str()))
    }

    /// Assign a new bearer token
    ///
    /// The expiry is decoded first; a malformed token is rejected and nothing changes.
    /// Otherwise the token is stored on the auth provider (created if missing), the
    /// profile's `Authorization` header is set to `Bearer <token>` and the expiry recorded.
    pub fn set_token(&mut self, token: &str) -> Result<()> {
        let expiry = self.token.record(token)?;
        let mut profile = self.profile.write();
        profile
            .auth_provider
            .get_or_insert_with(AuthProvider::default)
            .token = Some(token.to_string().into());
        profile
            .headers
            .insert(AUTHORIZATION.into(), format!("Bearer {token}"));
        tracing::trace!(expiry, "bearer token assigned");
        Ok(())
    }

    /// The bearer token held by the auth provider
    pub fn token(&self) -> Option<SecretString> {
        self.profile.read().token().cloned()
    }

    /// Expiry of the current token in seconds since the epoch
    ///
    /// A token placed on the auth provider without going through [`Client::set_token`]
    /// is decoded on first access, including one that replaced the token recorded last.
    pub fn expiry(&mut self) -> Result<Option<i64>> {
        let Some(token) = self.token() else {
            self.token.clear();
            return Ok(None);
        };
        if self.token.is_for(token.expose_secret()) {
            return Ok(self.token.expiry());
        }
        let expiry = self.token.record(token.expose_secret())?;
        tracing::trace!(expiry, "decoded expiry of token set on the profile");
        Ok(Some(expiry))
    }

    /// Whether the token should be refreshed before issuing further requests
    ///
    /// Always `false` without an auth provider.
    pub fn is_expired(&mut self) -> Result<bool> {
        self.is_expired_at(Utc::now())
    }

    /// [`Client::is_expired`] against a given clock reading
    pub fn is_expired_at(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.profile.read().auth_provider.is_none() {
            return Ok(false);
        }
        self.expiry()?;
        Ok(self.token.is_expired_at(now))
    }

    fn request(&self, template: RequestTemplate) -> Result<RequestDescriptor> {
        let profile = self.profile.read();
        template.merge(&profile)
    }
}

/// Append form-encoded query pairs to `path`
fn with_query(path: String, populate: impl FnOnce(&mut Serializer<String>)) -> String {
    let mut qp = Serializer::new(String::new());
    populate(&mut qp);
    let query = qp.finish();
    if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    }
}

/// Discovery and OAuth
impl Client {
    /// Get the core API versions
    pub fn get_api(&self) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get("/api"))
    }

    /// Get the root paths served by the master
    ///
    /// With `authorization` off and no token held, the request goes out unauthenticated.
    pub fn get_paths(&self, authorization: bool) -> Result<RequestDescriptor> {
        let mut descriptor = self.request(RequestTemplate::get("/"))?;
        if !authorization && self.token().is_none() {
            descriptor.remove_header(AUTHORIZATION);
        }
        Ok(descriptor)
    }

    /// Request a token through the challenging client flow
    ///
    /// Removes the `Authorization` header from the shared profile.
    pub fn oauth_authorize(&self, credentials: &Credentials) -> Result<RequestDescriptor> {
        let path = with_query("/oauth/authorize".into(), |qp| {
            qp.append_pair("client_id", "openshift-challenging-client");
            qp.append_pair("response_type", "token");
        });
        self.oauth_request(path, credentials)
    }

    /// Request an authorization code through the browser client flow
    ///
    /// The code is delivered with a redirect to the master's token display page.
    /// Removes the `Authorization` header from the shared profile.
    pub fn oauth_authorize_web(&self, credentials: &Credentials) -> Result<RequestDescriptor> {
        let redirect_uri = format!("{}/oauth/token/display", self.url().trim_end_matches('/'));
        let path = with_query("/oauth/authorize".into(), |qp| {
            qp.append_pair("client_id", "openshift-browser-client");
            qp.append_pair("redirect_uri", &redirect_uri);
            qp.append_pair("response_type", "code");
        });
        self.oauth_request(path, credentials)
    }

    fn oauth_request(&self, path: String, credentials: &Credentials) -> Result<RequestDescriptor> {
        if self.profile.write().headers.remove(AUTHORIZATION).is_some() {
            tracing::debug!("dropped bearer token for the OAuth handshake");
        }
        self.request(
            RequestTemplate::get(path)
                .basic_auth(&credentials.username, &credentials.password)
                .header("X-Csrf-Token", "1"),
        )
    }

    /// Get the current user, optionally authenticating with `token` instead of the profile's
    pub fn get_user(&self, token: Option<&str>) -> Result<RequestDescriptor> {
        let mut template = RequestTemplate::get("/oapi/v1/users/~").headers(BTreeMap::new());
        if let Some(token) = token {
            template = template.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.request(template)
    }

    /// Fetch the OpenID Connect discovery document of the auth provider
    pub fn provider_configuration_url(&self) -> Result<RequestDescriptor> {
        let profile = self.profile.read();
        let provider = profile.auth_provider.as_ref().ok_or(Error::MissingAuthProvider)?;
        let issuer = provider.url.as_deref().ok_or(Error::MissingProviderUrl)?;
        // https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderConfig
        let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
        RequestDescriptor::from_url(&url, Method::GET)
    }

    /// Exchange the provider's refresh token for a new token at [`Client::token_url`]
    pub fn refresh_token(&self) -> Result<RequestDescriptor> {
        let token_url = self.token_url.as_deref().ok_or(Error::MissingTokenUrl)?;
        let profile = self.profile.read();
        let provider = profile.auth_provider.as_ref().ok_or(Error::MissingAuthProvider)?;
        let grant = RefreshTokenGrant {
            grant_type: "refresh_token",
            client_id: provider.client_id.as_deref(),
            client_secret: provider.client_secret.as_ref().map(|s| s.expose_secret()),
            refresh_token: provider.refresh_token.as_ref().map(|s| s.expose_secret()),
        };

        let mut descriptor = RequestDescriptor::from_url(token_url, Method::POST)?;
        descriptor.headers.insert("content-type".into(), JSON_MIME.into());
        descriptor.body = Some(serde_json::to_value(grant)?);
        Ok(descriptor)
    }
}

/// Core resources
impl Client {
    /// List namespaces
    pub fn get_namespaces(&self) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get("/api/v1/namespaces"))
    }

    /// List OpenShift projects
    pub fn get_projects(&self) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get("/oapi/v1/projects"))
    }

    /// List pods in a namespace
    pub fn get_pods(&self, namespace: &str) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get(format!("/api/v1/namespaces/{namespace}/pods")))
    }

    /// Get a single pod
    pub fn get_pod(&self, namespace: &str, name: &str) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get(format!(
            "/api/v1/namespaces/{namespace}/pods/{name}"
        )))
    }
}

/// Streaming endpoints
///
/// These carry protocol-upgrade headers for the transport to open a WebSocket.
impl Client {
    /// Watch pods in a namespace from `resource_version`
    pub fn watch_pods(&self, namespace: &str, resource_version: &str) -> Result<RequestDescriptor> {
        self.watch(namespace, resource_version, None)
    }

    /// Watch a single pod from `resource_version`
    pub fn watch_pod(&self, namespace: &str, name: &str, resource_version: &str) -> Result<RequestDescriptor> {
        self.watch(namespace, resource_version, Some(name))
    }

    fn watch(&self, namespace: &str, resource_version: &str, name: Option<&str>) -> Result<RequestDescriptor> {
        let path = with_query(format!("/api/v1/namespaces/{namespace}/pods"), |qp| {
            qp.append_pair("watch", "true");
            qp.append_pair("resourceVersion", resource_version);
            if let Some(name) = name {
                qp.append_pair("fieldSelector", &format!("metadata.name={name}"));
            }
        });
        let template = RequestTemplate::get(path)
            .headers(upgrade_headers(None))
            .header("Origin", self.url());
        self.request(template)
    }

    /// Follow the log of a pod
    pub fn follow_log(&self, namespace: &str, name: &str, lp: &LogParams) -> Result<RequestDescriptor> {
        let path = with_query(format!("/api/v1/namespaces/{namespace}/pods/{name}/log"), |qp| {
            lp.populate_qp(qp)
        });
        self.request(RequestTemplate::get(path).headers(upgrade_headers(Some(StreamProtocol::Binary))))
    }

    /// Run a command in a pod
    pub fn exec(&self, namespace: &str, pod: &str, ep: &ExecParams) -> Result<RequestDescriptor> {
        let path = with_query(format!("/api/v1/namespaces/{namespace}/pods/{pod}/exec"), |qp| {
            ep.populate_qp(qp)
        });
        self.request(RequestTemplate::get(path).headers(upgrade_headers(Some(StreamProtocol::Channel))))
    }
}

/// Resource usage
///
/// Served by the kubelet through the node proxy until the Metrics API is available everywhere.
impl Client {
    /// Summary stats of a node
    pub fn summary_stats(&self, node: &str) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get(format!(
            "/api/v1/nodes/{node}/proxy/stats/summary"
        )))
    }

    /// cAdvisor stats of a single container
    pub fn container_stats(
        &self,
        node: &str,
        namespace: &str,
        pod: &str,
        uid: &str,
        container: &str,
    ) -> Result<RequestDescriptor> {
        self.request(RequestTemplate::get(format!(
            "/api/v1/nodes/{node}/proxy/stats/{namespace}/{pod}/{uid}/{container}"
        )))
    }
}
