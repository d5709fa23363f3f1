//! API middleware: API key auth and request logging.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::info;

/// Whether `headers` carry `expected`, as `Authorization: Bearer <key>` or
/// `X-API-Key: <key>`. No expected key means everything passes.
pub fn check_api_key(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = match auth.strip_prefix("Bearer ") {
        Some(bearer) => bearer,
        None => headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    };

    token == expected
}

/// API key authentication middleware. State is the expected key.
pub async fn auth_middleware(
    State(expected): State<Arc<Option<String>>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !check_api_key(&headers, expected.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "error": "Invalid or missing API key. Set Authorization: Bearer <key> or X-API-Key: <key>"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Request logging middleware.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} → {} ({:.1}ms)",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    response
}
