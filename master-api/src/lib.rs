//! Request descriptors for the Kubernetes / OpenShift master API
//!
//! This crate builds requests but never sends them. A [`Client`] holds a shared
//! [`ConnectionProfile`] (base url, base path, default headers and an OpenID Connect
//! auth provider) and turns each API operation into a [`RequestDescriptor`] that any
//! HTTP or WebSocket transport can dispatch, for instance through
//! [`RequestDescriptor::to_http_request`].
//!
//! ```
//! use master_api::{Client, ConnectionProfile};
//!
//! let profile = ConnectionProfile::new("https://cluster.example.com:8443")
//!     .with_header("Accept", "application/json")
//!     .into_shared();
//! let client = Client::new(profile);
//! let descriptor = client.get_pod("default", "web-0")?;
//! assert_eq!(descriptor.path, "/api/v1/namespaces/default/pods/web-0");
//! assert_eq!(descriptor.header("Accept"), Some("application/json"));
//! # Ok::<(), master_api::Error>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
pub use client::{Client, Credentials};

mod error;
pub use error::{ConfigError, Error, TokenError};

pub mod merge;

pub mod params;
pub use params::{ExecParams, LogParams};

pub mod profile;
pub use profile::{AuthProvider, ConnectionProfile, SharedProfile};

pub mod request;
pub use request::{RequestDescriptor, RequestTemplate};

pub mod token;
pub use token::TokenState;

pub mod upgrade;
pub use upgrade::StreamProtocol;

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
