use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use trafficguard_core_types::{now_millis, REQUEST_TIME_HEADER};
use trafficguard_policy_center::defaults::DEFAULT_SIGNATURE_LENGTH;
use trafficguard_policy_center::SignConfig;

type HmacSha256 = Hmac<Sha256>;

/// Hex length of a full HMAC-SHA256 digest.
const FULL_SIGNATURE_LEN: usize = 64;

/// Outcome of checking a `Request-Time` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignCheck {
    /// Signing is off; every request is trusted.
    Disabled,
    Valid,
    Missing,
    Malformed,
    BadTimestamp,
    Expired { drift_ms: u64 },
    Mismatch,
}

impl SignCheck {
    pub fn is_trusted(&self) -> bool {
        matches!(self, SignCheck::Disabled | SignCheck::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignCheck::Disabled => "disabled",
            SignCheck::Valid => "valid",
            SignCheck::Missing => "missing",
            SignCheck::Malformed => "malformed",
            SignCheck::BadTimestamp => "bad_timestamp",
            SignCheck::Expired { .. } => "expired",
            SignCheck::Mismatch => "mismatch",
        }
    }
}

/// Hex HMAC-SHA256 of `data`, cut to `length` characters (at most 64).
pub fn generate_signature(data: &str, secret: &str, length: usize) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(data.as_bytes());
    let mut full = hex::encode(mac.finalize().into_bytes());
    full.truncate(length.min(FULL_SIGNATURE_LEN));
    full
}

/// Builds a `<unixMillis>.<signature>` header value for `now_ms`.
pub fn sign(secret: &str, length: usize, now_ms: i64) -> String {
    let timestamp = now_ms.to_string();
    let signature = generate_signature(&timestamp, secret, length);
    format!("{timestamp}.{signature}")
}

/// Client helper: signs the current wall clock.
pub fn generate_request_time(secret: &str, length: usize) -> String {
    sign(secret, length, now_millis())
}

pub fn check(header: &str, config: &SignConfig, now_ms: i64) -> SignCheck {
    if !config.is_active() {
        return SignCheck::Disabled;
    }
    if header.is_empty() {
        debug!("request without {} header", REQUEST_TIME_HEADER);
        return SignCheck::Missing;
    }

    let Some((timestamp_raw, signature)) = header.split_once('.') else {
        warn!(request_time = %header, "invalid request_time format, expected timestamp.signature");
        return SignCheck::Malformed;
    };

    let timestamp = match timestamp_raw.parse::<i64>() {
        Ok(timestamp) => timestamp,
        Err(_) => {
            warn!(timestamp = %timestamp_raw, "invalid request_time timestamp");
            return SignCheck::BadTimestamp;
        }
    };

    let drift_ms = now_ms.abs_diff(timestamp);
    let max_drift_ms = config.max_drift_ms();
    if drift_ms > max_drift_ms {
        warn!(timestamp, now = now_ms, drift_ms, max_drift_ms, "request_time drift too large");
        return SignCheck::Expired { drift_ms };
    }

    let length = signature_length(config);
    let expected = generate_signature(timestamp_raw, &config.secret, length);
    if bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
        SignCheck::Valid
    } else {
        warn!(expected_length = length, "request signature mismatch");
        SignCheck::Mismatch
    }
}

pub fn verify(header: &str, config: &SignConfig, now_ms: i64) -> bool {
    check(header, config, now_ms).is_trusted()
}

fn signature_length(config: &SignConfig) -> usize {
    let raw = if config.signature_length > 0 {
        config.signature_length
    } else {
        DEFAULT_SIGNATURE_LENGTH
    };
    usize::try_from(raw)
        .unwrap_or(FULL_SIGNATURE_LEN)
        .min(FULL_SIGNATURE_LEN)
}
