//! Cross-origin policy.
//!
//! # Responsibilities
//! - Reflect the request origin and allow credentials
//! - Answer preflight and bare `OPTIONS` requests without running the chain
//! - Put the allow/expose headers on every response, errors included
//!
//! # Design Decisions
//! - One policy for every route
//! - `CorsLayer` handles real preflights; the header layers cover the rest

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_EXPOSE_HEADERS,
};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Header clients may use to pass a session reference.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("sessionid");

const ALLOWED_HEADERS: &str = "sessionid, origin, x-requested-with, content-type, authorization, accept";
const ALLOWED_METHODS: &str = "GET, HEAD, PUT, PATCH, POST, DELETE, OPTIONS";

fn allowed_headers() -> [HeaderName; 6] {
    [
        SESSION_ID_HEADER,
        HeaderName::from_static("origin"),
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static("content-type"),
        HeaderName::from_static("authorization"),
        HeaderName::from_static("accept"),
    ]
}

fn allowed_methods() -> [Method; 7] {
    [
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
        Method::OPTIONS,
    ]
}

/// The `tower-http` policy used for preflights and origin reflection.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .expose_headers([SESSION_ID_HEADER])
}

/// `OPTIONS` requests that are not preflights stop here.
pub async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(request).await
}

/// Wrap `router` so the cross-origin policy is the outermost stage.
pub fn apply(router: Router) -> Router {
    router
        .layer(middleware::from_fn(answer_options))
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("sessionid"),
        ))
}
