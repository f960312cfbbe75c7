use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::{opts, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref SERVER_REQUESTS_INTERCEPT: IntCounterVec = IntCounterVec::new(
        opts!(
            "server_requests_intercept",
            "The interception strategy of requests"
        ),
        &["server_name", "path", "has_sign", "verify", "block"]
    )
    .unwrap();
}

/// One request as seen by the interceptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterceptEvent {
    pub server_name: String,
    pub path: String,
    pub has_sign: bool,
    /// Signature was missing or rejected.
    pub abnormal: bool,
    pub blocked: bool,
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl InterceptEvent {
    /// Label values in `server_name, path, has_sign, verify, block` order.
    pub fn label_values(&self) -> [&str; 5] {
        [
            self.server_name.as_str(),
            self.path.as_str(),
            flag(self.has_sign),
            flag(self.abnormal),
            flag(self.blocked),
        ]
    }
}

pub trait MetricsSink: Send + Sync {
    fn record_intercept(&self, event: &InterceptEvent);
}

pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_intercept(&self, _event: &InterceptEvent) {}
}

#[derive(Clone, Default)]
pub struct PrometheusSink;

impl PrometheusSink {
    pub fn new() -> Self {
        Self
    }

    pub fn register(registry: &Registry) {
        if let Err(err) = registry.register(Box::new(SERVER_REQUESTS_INTERCEPT.clone())) {
            if !matches!(err, prometheus::Error::AlreadyReg) {
                error!(?err, "failed to register interception metric");
            }
        }
    }

    pub fn count(event: &InterceptEvent) -> u64 {
        SERVER_REQUESTS_INTERCEPT
            .with_label_values(&event.label_values())
            .get()
    }
}

impl MetricsSink for PrometheusSink {
    fn record_intercept(&self, event: &InterceptEvent) {
        SERVER_REQUESTS_INTERCEPT
            .with_label_values(&event.label_values())
            .inc();
    }
}

/// Emits its event exactly once, when dropped.
///
/// Created before any request processing so that early returns and cancelled
/// futures are still counted.
pub struct InterceptRecord {
    sink: Arc<dyn MetricsSink>,
    event: InterceptEvent,
}

impl InterceptRecord {
    pub fn new(sink: Arc<dyn MetricsSink>, server_name: &str, path: &str) -> Self {
        Self {
            sink,
            event: InterceptEvent {
                server_name: server_name.to_string(),
                path: path.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn event_mut(&mut self) -> &mut InterceptEvent {
        &mut self.event
    }
}

impl Drop for InterceptRecord {
    fn drop(&mut self) {
        self.sink.record_intercept(&self.event);
    }
}
