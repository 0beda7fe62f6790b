//! Bearer token expiry tracking
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Number;

use crate::error::TokenError;

/// Seconds before its `exp` claim at which a token is considered stale.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

const JWT_BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    base64::engine::GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent),
);
const STANDARD_BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    base64::engine::GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent),
);

/// Expiry of the bearer token last seen by a [`Client`](crate::Client).
///
/// The token itself lives on the profile's [`AuthProvider`](crate::AuthProvider);
/// this caches what was decoded from it, keyed by the token it was decoded from.
#[derive(Clone, Debug, Default)]
pub struct TokenState {
    expiry: Option<i64>,
    token: Option<SecretString>,
}

impl TokenState {
    /// Recorded expiry in seconds since the epoch
    pub fn expiry(&self) -> Option<i64> {
        self.expiry
    }

    /// Whether the recorded expiry was decoded from `token`
    pub fn is_for(&self, token: &str) -> bool {
        self.token.as_ref().is_some_and(|t| t.expose_secret() == token)
    }

    /// Decode the expiry of `token` and record it
    ///
    /// On error the previously recorded expiry is kept.
    pub fn record(&mut self, token: &str) -> Result<i64, TokenError> {
        let expiry = decode_expiry(token)?;
        self.expiry = Some(expiry);
        self.token = Some(token.to_string().into());
        Ok(expiry)
    }

    /// Forget the recorded expiry
    pub fn clear(&mut self) {
        self.expiry = None;
        self.token = None;
    }

    /// Whether the recorded expiry falls within [`EXPIRY_MARGIN_SECS`] of `now`
    ///
    /// Nothing recorded counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - now.timestamp() < EXPIRY_MARGIN_SECS,
            None => true,
        }
    }
}

/// Claims extracted from the token. Only the expiration time matters here.
#[derive(Deserialize)]
struct Claims {
    #[serde(rename = "exp", deserialize_with = "deserialize_expiry")]
    expiry: i64,
}

/// Deserialize expiration time from a JSON number.
fn deserialize_expiry<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let json_number = Number::deserialize(deserializer)?;

    json_number
        .as_i64()
        .or_else(|| Some(json_number.as_f64()? as i64))
        .ok_or(serde::de::Error::custom("cannot be casted to i64"))
}

/// Extract the `exp` claim of a JWT-shaped token without verifying its signature.
pub fn decode_expiry(token: &str) -> Result<i64, TokenError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::InvalidFormat);
    };
    let payload = JWT_BASE64_ENGINE
        .decode(payload)
        .or_else(|_| STANDARD_BASE64_ENGINE.decode(payload))?;
    let expiry = serde_json::from_slice::<Claims>(&payload)?.expiry;
    Utc.timestamp_opt(expiry, 0)
        .earliest()
        .ok_or(TokenError::InvalidExpirationTimestamp)?;
    Ok(expiry)
}
