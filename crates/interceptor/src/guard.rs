use std::sync::Arc;

use axum::http::header::{REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use rand::Rng;
use tracing::debug;
use trafficguard_core_types::{now_millis, CallerId, RequestAttributes, REQUEST_TIME_HEADER};
use trafficguard_policy_center::PolicyCenter;

use crate::events::{AlertSink, FeatureRecorder, NotifyAlert, TrafficFeature};
use crate::metrics::{InterceptRecord, MetricsSink};
use crate::privacy::sanitize_headers;
use crate::rules::{self, Decision};
use crate::sign::{self, SignCheck};

/// What the interceptor needs to know about one request.
pub struct RequestView<'a> {
    pub attributes: RequestAttributes,
    pub request_time: Option<&'a HeaderValue>,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestView<'a> {
    pub fn new(path: impl Into<String>, headers: &'a HeaderMap) -> Self {
        let header_text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            attributes: RequestAttributes {
                path: path.into(),
                referer: header_text(REFERER),
                user_agent: header_text(USER_AGENT),
                user_id: String::new(),
            },
            request_time: headers.get(REQUEST_TIME_HEADER),
            headers,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.attributes.user_id = user_id.into();
        self
    }

    /// Reads the path, headers and the [`CallerId`] extension, if any.
    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        let view = Self::new(request.uri().path(), request.headers());
        match request.extensions().get::<CallerId>() {
            Some(caller) => view.with_user_id(caller.0.clone()),
            None => view,
        }
    }

    pub fn has_sign(&self) -> bool {
        self.request_time
            .map(|value| !value.is_empty())
            .unwrap_or(false)
    }
}

/// Result of running one request through the interception state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inspection {
    pub has_sign: bool,
    /// Signature missing or rejected; the request went through rule evaluation.
    pub abnormal: bool,
    pub blocked: bool,
    pub check: SignCheck,
    pub decision: Option<Decision>,
}

struct GuardInner {
    center: Arc<PolicyCenter>,
    features: Arc<dyn FeatureRecorder>,
    alerts: Arc<dyn AlertSink>,
    metrics: Arc<dyn MetricsSink>,
}

/// Request-path side of the interceptor. Cloning is cheap.
#[derive(Clone)]
pub struct TrafficGuard {
    inner: Arc<GuardInner>,
}

impl TrafficGuard {
    pub(crate) fn new(
        center: Arc<PolicyCenter>,
        features: Arc<dyn FeatureRecorder>,
        alerts: Arc<dyn AlertSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                center,
                features,
                alerts,
                metrics,
            }),
        }
    }

    pub fn center(&self) -> Arc<PolicyCenter> {
        Arc::clone(&self.inner.center)
    }

    pub fn server_name(&self) -> &str {
        self.inner.center.server_name().as_str()
    }

    /// Starts the per-request metrics record; it is emitted when dropped.
    pub fn begin(&self, path: &str) -> InterceptRecord {
        InterceptRecord::new(Arc::clone(&self.inner.metrics), self.server_name(), path)
    }

    pub fn inspect(&self, view: &RequestView<'_>) -> Inspection {
        self.inspect_with(view, now_millis(), &mut rand::thread_rng())
    }

    pub fn inspect_with<R: Rng + ?Sized>(
        &self,
        view: &RequestView<'_>,
        now_ms: i64,
        rng: &mut R,
    ) -> Inspection {
        let has_sign = view.has_sign();
        let sign_config = self.inner.center.sign_config();
        let check = match view.request_time.map(HeaderValue::to_str) {
            Some(Ok(raw)) => sign::check(raw, &sign_config, now_ms),
            Some(Err(_)) if sign_config.is_active() => SignCheck::Malformed,
            _ => sign::check("", &sign_config, now_ms),
        };

        if check.is_trusted() {
            return Inspection {
                has_sign,
                abnormal: false,
                blocked: false,
                check,
                decision: None,
            };
        }

        self.record_feature(view, check);
        let policy = self.inner.center.intercept();
        let decision = rules::decide_with(policy.as_deref(), &view.attributes, rng);
        if !decision.notify.is_empty() {
            self.inner.alerts.notify(&NotifyAlert {
                server_name: self.server_name().to_string(),
                path: view.attributes.path.clone(),
                user_id: view.attributes.user_id.clone(),
                scopes: decision.notify.clone(),
            });
        }
        if decision.blocked {
            debug!(path = %view.attributes.path, reason = check.as_str(), "request rejected by interception policy");
        }

        Inspection {
            has_sign,
            abnormal: true,
            blocked: decision.blocked,
            check,
            decision: Some(decision),
        }
    }

    fn record_feature(&self, view: &RequestView<'_>, check: SignCheck) {
        let attrs = &view.attributes;
        self.inner.features.record(&TrafficFeature {
            server_name: self.server_name().to_string(),
            path: attrs.path.clone(),
            referer: attrs.referer.clone(),
            user_agent: attrs.user_agent.clone(),
            user_id: attrs.user_id.clone(),
            reason: check.as_str(),
            headers: sanitize_headers(view.headers),
        });
    }
}

impl InterceptRecord {
    pub fn observe(&mut self, inspection: &Inspection) {
        let event = self.event_mut();
        event.has_sign = inspection.has_sign;
        event.abnormal = inspection.abnormal;
        event.blocked = inspection.blocked;
    }
}
