//! Request context augmentation.
//!
//! Last stage before dispatch: every request gets a handle to the shared
//! store so handlers never reach for process globals.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::error::AppError;
use crate::store::{StoreConnection, StoreError};

/// Attach the store handle to the request.
pub async fn attach_store(
    State(store): State<StoreConnection>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(store);
    next.run(request).await
}

impl<S> FromRequestParts<S> for StoreConnection
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<StoreConnection>()
            .cloned()
            .ok_or(AppError::Store(StoreError::NotConnected))
    }
}
