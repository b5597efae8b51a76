//! Request identification and access logging.
//!
//! # Responsibilities
//! - Assign a UUID `x-request-id` unless the client sent one
//! - Echo the ID on the response, error responses included
//! - Build the access-log span for `TraceLayer`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Access logging is only installed in development

use axum::extract::Request;
use axum::http::HeaderName;
use axum::Router;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, Span};

/// Header name for request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Wrap `router` so every request carries an ID and every response echoes it.
pub fn with_request_id(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

/// Span for one request, tagged with its ID.
pub fn make_span(request: &Request) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Wrap `router` with the development access log.
pub fn with_access_log(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(make_span)
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
