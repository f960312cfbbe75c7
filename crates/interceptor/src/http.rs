use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::errors::InterceptError;
use crate::guard::{RequestView, TrafficGuard};

/// Axum middleware; install with `axum::middleware::from_fn_with_state(guard, intercept)`.
///
/// The metrics record is taken before inspection and dropped after the downstream
/// handler finishes, so every request is counted once whichever way it leaves.
/// The metric path label is the matched route template when axum resolved one, so
/// `/orders/:id` stays a single series; rules still see the raw request path.
pub async fn intercept(
    State(guard): State<TrafficGuard>,
    request: Request,
    next: Next,
) -> Response {
    let mut record = guard.begin(metric_path(&request));
    let inspection = guard.inspect(&RequestView::from_request(&request));
    record.observe(&inspection);
    if inspection.blocked {
        return HttpError::from(InterceptError::Blocked).into_response();
    }
    next.run(request).await
}

fn metric_path(request: &Request) -> &str {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path())
}

pub fn protect<S>(router: Router<S>, guard: TrafficGuard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(guard, intercept))
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl HttpError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn too_many(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "too_many_requests", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<InterceptError> for HttpError {
    fn from(value: InterceptError) -> Self {
        match value {
            InterceptError::Blocked => HttpError::too_many("request rejected"),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_maps_to_429_without_details() {
        let err = HttpError::from(InterceptError::Blocked);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code, "too_many_requests");
        assert_eq!(err.message, "request rejected");
    }
}
