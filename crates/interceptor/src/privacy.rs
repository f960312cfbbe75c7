use std::collections::BTreeMap;

use axum::http::HeaderMap;

pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-access-token",
    "x-refresh-token",
    "proxy-authorization",
    "www-authenticate",
];

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Copy of `headers` safe to log: credentials are replaced by [`REDACTED`],
/// repeated headers are joined with `", "`.
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut sanitized = BTreeMap::new();
    for name in headers.keys() {
        let key = name.as_str().to_string();
        if is_sensitive(name.as_str()) {
            sanitized.insert(key, REDACTED.to_string());
            continue;
        }
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        sanitized.insert(key, joined);
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn sensitive_values_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        headers.insert("x-api-key", HeaderValue::from_static("k"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["authorization"], REDACTED);
        assert_eq!(sanitized["cookie"], REDACTED);
        assert_eq!(sanitized["x-api-key"], REDACTED);
        assert_eq!(sanitized["user-agent"], "curl/8.0");
        let rendered = format!("{sanitized:?}");
        assert!(!rendered.contains("Bearer abc"));
        assert!(!rendered.contains("session=1"));
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["accept"], "text/html, application/json");
        assert_eq!(sanitized["set-cookie"], REDACTED);
        assert_eq!(sanitized.len(), 2);
    }

    #[test]
    fn sensitivity_ignores_case() {
        assert!(is_sensitive("Proxy-Authorization"));
        assert!(is_sensitive("WWW-Authenticate"));
        assert!(!is_sensitive("referer"));
    }
}
