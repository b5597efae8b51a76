//! Authentication gate stage.
//!
//! Runs after the session stage. Turns the session's principal reference into
//! an [`Identity`]; a reference that no longer resolves is removed so the next
//! request does not look it up again.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::{AuthError, Authenticator, Identity, PRINCIPAL};
use crate::http::error::AppError;
use crate::session::Session;
use crate::store::StoreConnection;

#[derive(Clone)]
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    store: StoreConnection,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>, store: StoreConnection) -> Self {
        Self {
            authenticator,
            store,
        }
    }

    /// Resolve the identity for `session`.
    pub async fn identify(&self, session: &Session) -> Result<Identity, AuthError> {
        let Some(reference) = session.get(&PRINCIPAL) else {
            return Ok(Identity::Anonymous);
        };

        match self.authenticator.restore(&reference, &self.store).await? {
            Some(principal) => Ok(Identity::Authenticated(principal)),
            None => {
                tracing::debug!(principal = %reference, "Dropping stale principal reference");
                session.remove(&PRINCIPAL);
                Ok(Identity::Anonymous)
            }
        }
    }
}

pub async fn authentication_gate(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or(AppError::SessionUnavailable)?;

    let identity = gate.identify(&session).await?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
