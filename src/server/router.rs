use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use trafficguard_core_types::CallerId;
use trafficguard_interceptor::{protect, TrafficGuard};

use super::state::ServeState;
use crate::metrics;

/// Identity header trusted from the fronting gateway.
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Operational routes stay outside the guard; everything else goes through it.
pub fn build_router(state: ServeState, guard: TrafficGuard) -> Router {
    let protected = protect(upstream_router(), guard).layer(middleware::from_fn(attach_caller));

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
}

fn upstream_router() -> Router {
    Router::new().fallback(echo_handler)
}

async fn attach_caller(mut request: Request, next: Next) -> Response {
    let caller = request
        .headers()
        .get(CALLER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(CallerId::new);
    if let Some(caller) = caller {
        request.extensions_mut().insert(caller);
    }
    next.run(request).await
}

async fn echo_handler(uri: Uri, caller: Option<Extension<CallerId>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "path": uri.path(),
        "caller": caller.map(|Extension(caller)| caller.0),
    }))
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    let snapshot = state.health_snapshot();
    Json(json!({
        "status": "ok",
        "server_name": snapshot.server_name,
        "store": snapshot.store,
        "revision": snapshot.revision,
        "policy_loaded": snapshot.policy_loaded,
        "signing": snapshot.signing,
        "running": snapshot.running,
    }))
}

async fn ready_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let snapshot = state.health_snapshot();
    let status = if snapshot.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": snapshot.ready,
            "running": snapshot.running,
            "revision": snapshot.revision,
            "policy_loaded": snapshot.policy_loaded,
            "polls": snapshot.status.polls,
            "last_success_ms": snapshot.status.last_success_ms,
            "consecutive_failures": snapshot.status.consecutive_failures,
            "restarts": snapshot.status.restarts,
            "last_error": snapshot.status.last_error,
        })),
    )
}
