//! Request errors and the error normalizer.
//!
//! # Responsibilities
//! - Give every failure in the chain one type (`AppError`)
//! - Carry the error out of handlers and stages via response extensions
//! - Render the client-facing response once, at the top of the chain
//!
//! # Design Decisions
//! - Development: status or 500, JSON body with message and detail
//! - Production: status or 404, empty body (never confirms a resource exists)
//! - Headers already set on the failed response (cookies, request ID) survive
//! - A 4xx/5xx that did not come from an `AppError` (extractor rejections,
//!   bare status codes) is adopted as `AppError::Status` and rendered the same way

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::session::SessionError;
use crate::store::StoreError;

/// Any failure raised while serving a request.
#[derive(Debug, Error)]
pub enum AppError {
    /// No route matched the path and method.
    #[error("Not Found")]
    NotFound,

    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// A stage that needs the session ran without one.
    #[error("session is not available on this request")]
    SessionUnavailable,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("handler panicked: {0}")]
    Panic(String),

    /// Explicit status chosen by a handler.
    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl AppError {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Status {
            status,
            message: message.into(),
        }
    }

    /// The status this error asks for, if it has an opinion.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AppError::NotFound => Some(StatusCode::NOT_FOUND),
            AppError::MalformedBody(_) | AppError::BodyRead(_) => Some(StatusCode::BAD_REQUEST),
            AppError::PayloadTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            AppError::Status { status, .. } => Some(*status),
            AppError::SessionUnavailable
            | AppError::Session(_)
            | AppError::Store(_)
            | AppError::Auth(_)
            | AppError::Panic(_) => None,
        }
    }

    /// Stable machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::MalformedBody(_) => "malformed_body",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::BodyRead(_) => "body_read",
            AppError::SessionUnavailable => "session_unavailable",
            AppError::Session(_) => "session",
            AppError::Store(_) => "store",
            AppError::Auth(_) => "auth",
            AppError::Panic(_) => "panic",
            AppError::Status { .. } => "status",
        }
    }

    fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            causes.push(err.to_string());
            source = err.source();
        }
        causes
    }
}

/// Error attached to a response for the normalizer to render.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self
            .status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
        response.extensions_mut().insert(ErrorReport(Arc::new(self)));
        response
    }
}

/// How much of an error the client gets to see. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub expose_error_detail: bool,
}

impl ErrorPolicy {
    pub fn new(expose_error_detail: bool) -> Self {
        Self {
            expose_error_detail,
        }
    }

    pub fn status_for(&self, error: &AppError) -> StatusCode {
        error.status().unwrap_or(if self.expose_error_detail {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::NOT_FOUND
        })
    }

    /// Replace the status and body of `response` with the rendering of `error`.
    pub fn render(&self, error: &AppError, response: Response) -> Response {
        let (mut parts, _body) = response.into_parts();
        parts.status = self.status_for(error);
        parts.headers.remove(CONTENT_TYPE);
        parts.headers.remove(CONTENT_LENGTH);
        parts.extensions.remove::<ErrorReport>();

        if !self.expose_error_detail {
            return Response::from_parts(parts, Body::empty());
        }

        let body = json!({
            "message": error.to_string(),
            "error": {
                "status": parts.status.as_u16(),
                "kind": error.kind(),
                "detail": format!("{error:?}"),
                "causes": error.causes(),
            }
        });
        parts
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Response::from_parts(parts, Body::from(body.to_string()))
    }
}

/// Largest foreign error body kept as the message of an adopted error.
const ADOPTED_BODY_LIMIT: usize = 16 * 1024;

/// Wrap an error response that carries no [`ErrorReport`] into one that does.
async fn adopt(response: Response) -> (Arc<AppError>, Response) {
    let (parts, body) = response.into_parts();
    let text = axum::body::to_bytes(body, ADOPTED_BODY_LIMIT)
        .await
        .ok()
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    let message = text.unwrap_or_else(|| {
        parts
            .status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    let error = Arc::new(AppError::with_status(parts.status, message));
    (error, Response::from_parts(parts, Body::empty()))
}

/// Error normalizer stage. Renders any [`ErrorReport`] coming back up the chain,
/// and any other 4xx/5xx response.
pub async fn normalize_errors(
    State(policy): State<ErrorPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let (error, response) = match response.extensions().get::<ErrorReport>().cloned() {
        Some(ErrorReport(error)) => (error, response),
        None if response.status().is_client_error() || response.status().is_server_error() => {
            adopt(response).await
        }
        None => return response,
    };

    let rendered = policy.render(&error, response);
    if rendered.status().is_server_error() || error.status().is_none() {
        tracing::error!(%method, %path, status = %rendered.status(), error = %error, "Request failed");
    } else {
        tracing::debug!(%method, %path, status = %rendered.status(), error = %error, "Request rejected");
    }
    rendered
}

/// Fallback for unmatched paths and methods.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Turns a caught panic into an [`AppError`] response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Panic(message).into_response()
}
