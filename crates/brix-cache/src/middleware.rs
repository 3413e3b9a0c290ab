use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::rate_limit::{RateLimitOptions, RateLimitResult, RateLimiter};

/// Identity used when a request carries no client address headers.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// State for [`rate_limit_middleware`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub options: RateLimitOptions,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, options: RateLimitOptions) -> Self {
        Self { limiter, options }
    }
}

/// Per-client rate limiting for an axum router.
///
/// Clients are identified by the first `X-Forwarded-For` hop, then
/// `X-Real-IP`. Admitted responses carry the `X-RateLimit-*` headers; rejected
/// requests get `429 Too Many Requests` with a JSON body and never reach the
/// inner service.
///
/// ```ignore
/// let app = Router::new()
///     .route("/fixtures", get(list_fixtures))
///     .layer(middleware::from_fn_with_state(state, rate_limit_middleware));
/// ```
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(req.headers());
    let result = state.limiter.check(&client, &state.options).await;

    if !result.success {
        tracing::debug!(client = %client, path = %req.uri().path(), "request rate limited");
        return too_many_requests(&result);
    }

    let mut response = next.run(req).await;
    apply_headers(response.headers_mut(), &result);
    response
}

/// Extracts the client identity from proxy headers.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

fn too_many_requests(result: &RateLimitResult) -> Response {
    let body = json!({
        "error": "Too Many Requests",
        "message": result.message.as_deref().unwrap_or("Rate limit exceeded"),
        "retryAfter": result.retry_after,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_headers(response.headers_mut(), result);
    response
}

fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    for (name, value) in result.headers() {
        // Parsing lowercases the canonical header names.
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            headers.insert(name, value);
        }
    }
}
