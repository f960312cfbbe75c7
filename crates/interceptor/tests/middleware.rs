use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tower::ServiceExt;
use trafficguard_core_types::{now_millis, CallerId, ServerName, REQUEST_TIME_HEADER};
use trafficguard_interceptor::sign;
use trafficguard_interceptor::{
    GuardBootstrap, InterceptEvent, MetricsSink, NoopAlerts, NoopFeatures,
};
use trafficguard_policy_center::{InterceptConfig, PolicyCenter, SignConfig, SubRuleConfig};

#[derive(Default)]
struct Events(Mutex<Vec<InterceptEvent>>);

impl MetricsSink for Events {
    fn record_intercept(&self, event: &InterceptEvent) {
        self.0.lock().push(event.clone());
    }
}

fn app(policy: InterceptConfig, events: Arc<Events>) -> Router {
    let center = Arc::new(PolicyCenter::new(
        ServerName::parse("checkout").unwrap(),
        SignConfig::enabled("shared"),
    ));
    center.publish_intercept(policy);
    let router = Router::new()
        .route("/pay", get(|| async { "paid" }))
        .route("/orders/:id", get(|| async { "order" }));
    GuardBootstrap::new(center)
        .with_features(Arc::new(NoopFeatures))
        .with_alerts(Arc::new(NoopAlerts))
        .with_metrics(events)
        .protect(router)
}

fn uid_policy() -> InterceptConfig {
    InterceptConfig {
        sub_rules: vec![SubRuleConfig::new("uid", "abc,def", 100)],
        radio: -1,
        switch: true,
    }
}

#[tokio::test]
async fn listed_caller_is_rejected_with_429() {
    let events = Arc::new(Events::default());
    let response = app(uid_policy(), events.clone())
        .oneshot(
            Request::builder()
                .uri("/pay")
                .extension(CallerId::new("abc"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "too_many_requests");
    assert_eq!(json["message"], "request rejected");
    assert!(!String::from_utf8_lossy(&body).contains("radio"));

    let emitted = events.0.lock();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].label_values(), ["checkout", "/pay", "0", "1", "1"]);
}

#[tokio::test]
async fn other_caller_reaches_handler() {
    let events = Arc::new(Events::default());
    let response = app(uid_policy(), events.clone())
        .oneshot(
            Request::builder()
                .uri("/pay")
                .extension(CallerId::new("xyz"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"paid");
    assert_eq!(
        events.0.lock()[0].label_values(),
        ["checkout", "/pay", "0", "1", "0"]
    );
}

#[tokio::test]
async fn signed_request_bypasses_rules() {
    let events = Arc::new(Events::default());
    let always = InterceptConfig {
        radio: 100,
        switch: true,
        sub_rules: Vec::new(),
    };
    let header = sign::sign("shared", 8, now_millis());
    let response = app(always, events.clone())
        .oneshot(
            Request::builder()
                .uri("/pay")
                .header(REQUEST_TIME_HEADER, header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        events.0.lock()[0].label_values(),
        ["checkout", "/pay", "1", "0", "0"]
    );
}

#[tokio::test]
async fn tampered_signature_is_evaluated() {
    let events = Arc::new(Events::default());
    let always = InterceptConfig {
        radio: 100,
        switch: true,
        sub_rules: Vec::new(),
    };
    let header = format!("{}.deadbeef", now_millis());
    let response = app(always, events.clone())
        .oneshot(
            Request::builder()
                .uri("/pay")
                .header(REQUEST_TIME_HEADER, header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        events.0.lock()[0].label_values(),
        ["checkout", "/pay", "1", "1", "1"]
    );
}

#[tokio::test]
async fn metric_path_uses_route_template_while_rules_see_raw_path() {
    let events = Arc::new(Events::default());
    let policy = InterceptConfig {
        sub_rules: vec![SubRuleConfig::new("path", "/orders/42", 100)],
        radio: -1,
        switch: true,
    };
    let router = app(policy, events.clone());

    for (uri, status) in [
        ("/orders/42", StatusCode::TOO_MANY_REQUESTS),
        ("/orders/7", StatusCode::OK),
    ] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), status, "{uri}");
    }

    let emitted = events.0.lock();
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].label_values(), ["checkout", "/orders/:id", "0", "1", "1"]);
    assert_eq!(emitted[1].label_values(), ["checkout", "/orders/:id", "0", "1", "0"]);
}
