//! Error handling in [`master-api`][crate]
use thiserror::Error;

/// Possible errors when building request descriptors
#[derive(Error, Debug)]
pub enum Error {
    /// A bearer token could not be decoded
    ///
    /// Malformed tokens are never treated as "no token".
    #[error("malformed token: {0}")]
    Token(
        #[source]
        #[from]
        TokenError,
    ),

    /// The operation needs an auth provider and none is configured
    #[error("no auth provider configured")]
    MissingAuthProvider,

    /// The auth provider has no url to discover the OpenID configuration from
    #[error("auth provider has no url")]
    MissingProviderUrl,

    /// A token refresh was requested before a token url was set
    #[error("no token url configured")]
    MissingTokenUrl,

    /// Failed to convert between a descriptor and its json form
    #[error("SerdeError: {0}")]
    SerdeError(
        #[source]
        #[from]
        serde_json::Error,
    ),

    /// Http based error
    #[error("HttpError: {0}")]
    HttpError(
        #[source]
        #[from]
        http::Error,
    ),

    /// Failed to construct a URI.
    #[error("InvalidUri: {0}")]
    InvalidUri(
        #[source]
        #[from]
        http::uri::InvalidUri,
    ),

    /// Configuration error
    #[error("Error loading connection profile: {0}")]
    Config(
        #[source]
        #[from]
        ConfigError,
    ),
}

/// Possible errors when extracting the expiration time from a bearer token.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token does not have three dot-delimited segments.
    #[error("not a valid JWT token")]
    InvalidFormat,
    /// The token payload is not properly encoded in base64.
    #[error("failed to decode base64: {0}")]
    InvalidBase64(
        #[source]
        #[from]
        base64::DecodeError,
    ),
    /// The token payload is not a JSON object containing an expiration timestamp.
    #[error("failed to unmarshal JSON: {0}")]
    InvalidJson(
        #[source]
        #[from]
        serde_json::Error,
    ),
    /// The expiration timestamp extracted from the payload is out of range.
    #[error("invalid expiration timestamp")]
    InvalidExpirationTimestamp,
}

#[derive(Error, Debug)]
// Redundant with the error messages and machine names
#[allow(missing_docs)]
/// Possible errors when loading a connection profile
pub enum ConfigError {
    #[error("Failed to parse connection profile YAML: {0}")]
    ParseYaml(#[source] serde_yaml::Error),

    #[error("Connection profile has an empty url")]
    EmptyUrl,
}
