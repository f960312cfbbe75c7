use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::rules::RuleScope;

/// Snapshot of a request that failed signature verification.
#[derive(Debug, Clone, Serialize, Default)]
pub struct TrafficFeature {
    pub server_name: String,
    pub path: String,
    pub referer: String,
    pub user_agent: String,
    pub user_id: String,
    /// Why the request was considered abnormal, see [`crate::sign::SignCheck::as_str`].
    pub reason: &'static str,
    /// Sanitized request headers.
    pub headers: BTreeMap<String, String>,
}

/// Raised when an evaluated rule carries the notify-only radio.
#[derive(Debug, Clone, Serialize, Default)]
pub struct NotifyAlert {
    pub server_name: String,
    pub path: String,
    pub user_id: String,
    pub scopes: Vec<RuleScope>,
}

/// Sink for abnormal-traffic snapshots kept for offline analysis.
pub trait FeatureRecorder: Send + Sync {
    fn record(&self, feature: &TrafficFeature);
}

/// Best-effort alerting hook; implementations must not block the request path.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &NotifyAlert);
}

pub struct NoopFeatures;

impl FeatureRecorder for NoopFeatures {
    fn record(&self, _feature: &TrafficFeature) {}
}

pub struct NoopAlerts;

impl AlertSink for NoopAlerts {
    fn notify(&self, _alert: &NotifyAlert) {}
}

/// Writes features to the `traffic_feature` log target.
#[derive(Default)]
pub struct TracingFeatureRecorder;

impl FeatureRecorder for TracingFeatureRecorder {
    fn record(&self, feature: &TrafficFeature) {
        let headers = serde_json::to_string(&feature.headers).unwrap_or_default();
        warn!(
            target: "traffic_feature",
            server = %feature.server_name,
            path = %feature.path,
            referer = %feature.referer,
            ua = %feature.user_agent,
            uid = %feature.user_id,
            reason = feature.reason,
            header = %headers,
            "abnormal traffic feature"
        );
    }
}

#[derive(Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, alert: &NotifyAlert) {
        warn!(
            target: "traffic_alert",
            server = %alert.server_name,
            path = %alert.path,
            uid = %alert.user_id,
            scopes = ?alert.scopes,
            "notify-only interception rule hit"
        );
    }
}
