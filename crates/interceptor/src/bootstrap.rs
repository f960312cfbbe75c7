use std::sync::Arc;

use axum::Router;
use trafficguard_policy_center::PolicyCenter;

use crate::events::{AlertSink, FeatureRecorder, TracingAlertSink, TracingFeatureRecorder};
use crate::guard::TrafficGuard;
use crate::http;
use crate::metrics::{MetricsSink, PrometheusSink};

/// Builder wiring a [`TrafficGuard`] to its collaborators.
///
/// Defaults log features and alerts through `tracing` and count requests in the
/// process-wide Prometheus counter.
#[derive(Clone)]
pub struct GuardBootstrap {
    center: Arc<PolicyCenter>,
    features: Arc<dyn FeatureRecorder>,
    alerts: Arc<dyn AlertSink>,
    metrics: Arc<dyn MetricsSink>,
}

impl GuardBootstrap {
    pub fn new(center: Arc<PolicyCenter>) -> Self {
        Self {
            center,
            features: Arc::new(TracingFeatureRecorder),
            alerts: Arc::new(TracingAlertSink),
            metrics: Arc::new(PrometheusSink::new()),
        }
    }

    pub fn with_features(mut self, features: Arc<dyn FeatureRecorder>) -> Self {
        self.features = features;
        self
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> TrafficGuard {
        TrafficGuard::new(self.center, self.features, self.alerts, self.metrics)
    }

    /// Wraps every route of `router` with the interception middleware.
    pub fn protect<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        http::protect(router, self.build())
    }
}
