use std::fmt;

use thiserror::Error;

/// Header carrying the `<unixMillis>.<hexSignature>` request signature.
pub const REQUEST_TIME_HEADER: &str = "Request-Time";

/// Remote store key prefix; the server name is appended verbatim.
pub const INTERCEPTION_KEY_PREFIX: &str = "traffic_interception_key_";

/// Shared error type for the interception crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("invalid server name: {0:?}")]
    InvalidServerName(String),
}

/// Identity of the service whose policy document is polled.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ServerName(String);

impl ServerName {
    /// Rejects blank names; anything else is kept verbatim, since it is part of the store key.
    pub fn parse(raw: &str) -> Result<Self, GuardError> {
        if raw.trim().is_empty() {
            return Err(GuardError::InvalidServerName(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the remote policy document for this server lives.
    pub fn interception_key(&self) -> String {
        format!("{INTERCEPTION_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller identity resolved by an upstream authentication layer.
///
/// Handlers place it into the request extensions; the interceptor only reads it.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Per-request attributes the rule engine matches against.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestAttributes {
    pub path: String,
    pub referer: String,
    pub user_agent: String,
    pub user_id: String,
}

/// Wall clock in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
