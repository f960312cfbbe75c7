use std::fmt;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_MAX_TIME_DRIFT_SECS, DEFAULT_SIGNATURE_LENGTH};
use crate::errors::PolicyError;

/// Signing policy for the `Request-Time` header.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignConfig {
    /// HMAC key; empty disables verification.
    pub secret: String,
    /// Number of hex characters of the signature that are compared.
    pub signature_length: i64,
    /// Half-width of the replay window, in seconds.
    pub max_time_drift_secs: i64,
    pub enabled: bool,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            signature_length: DEFAULT_SIGNATURE_LENGTH,
            max_time_drift_secs: DEFAULT_MAX_TIME_DRIFT_SECS,
            enabled: false,
        }
    }
}

impl SignConfig {
    pub fn enabled(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            enabled: true,
            ..Default::default()
        }
    }

    /// Replaces non-positive length/drift values with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.signature_length <= 0 {
            self.signature_length = DEFAULT_SIGNATURE_LENGTH;
        }
        if self.max_time_drift_secs <= 0 {
            self.max_time_drift_secs = DEFAULT_MAX_TIME_DRIFT_SECS;
        }
        self
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.secret.is_empty()
    }

    /// Accepted clock drift; non-positive values fall back to the default window.
    pub fn max_drift_ms(&self) -> u64 {
        let secs = if self.max_time_drift_secs > 0 {
            self.max_time_drift_secs
        } else {
            DEFAULT_MAX_TIME_DRIFT_SECS
        };
        secs.unsigned_abs().saturating_mul(1_000)
    }
}

impl fmt::Debug for SignConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.secret.is_empty() {
            "<empty>"
        } else {
            "<redacted>"
        };
        f.debug_struct("SignConfig")
            .field("secret", &secret)
            .field("signature_length", &self.signature_length)
            .field("max_time_drift_secs", &self.max_time_drift_secs)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Traffic-shedding policy document published under
/// `traffic_interception_key_<server>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterceptConfig {
    #[serde(default)]
    pub sub_rules: Vec<SubRuleConfig>,
    #[serde(default)]
    pub radio: i32,
    #[serde(default)]
    pub switch: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubRuleConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub radio: i32,
}

impl SubRuleConfig {
    pub fn new(rule: &str, value: &str, radio: i32) -> Self {
        Self {
            path: String::new(),
            rule: rule.to_string(),
            value: value.to_string(),
            radio,
        }
    }
}

pub fn decode_document(raw: &[u8]) -> Result<InterceptConfig, PolicyError> {
    serde_json::from_slice(raw).map_err(|err| PolicyError::Decode(err.to_string()))
}
