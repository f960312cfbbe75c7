//! Request-path interception: `Request-Time` signature checks, percentage based
//! shedding rules and the axum middleware tying them to a [`trafficguard_policy_center::PolicyCenter`].

pub mod bootstrap;
pub mod errors;
pub mod events;
pub mod guard;
pub mod http;
pub mod lint;
pub mod metrics;
pub mod privacy;
pub mod rules;
pub mod sign;

pub use bootstrap::GuardBootstrap;
pub use errors::InterceptError;
pub use events::{
    AlertSink, FeatureRecorder, NoopAlerts, NoopFeatures, NotifyAlert, TracingAlertSink,
    TracingFeatureRecorder, TrafficFeature,
};
pub use guard::{Inspection, RequestView, TrafficGuard};
pub use http::{intercept, protect, HttpError};
pub use lint::{lint_policy, LintIssue, LintSeverity};
pub use metrics::{InterceptEvent, InterceptRecord, MetricsSink, NoopMetrics, PrometheusSink};
pub use privacy::sanitize_headers;
pub use rules::{decide, decide_with, match_rule, Decision, Radio, RuleKind, RuleScope, RuleVerdict, SkipReason};
pub use sign::{generate_request_time, SignCheck};
