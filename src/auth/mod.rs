//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Session (principal reference under PRINCIPAL)
//!     → gate.rs asks the Authenticator to restore the Principal
//!     → Identity inserted into request extensions
//!     → handlers extract Identity (Anonymous when absent)
//! ```
//!
//! # Design Decisions
//! - Credential checks are out of scope; an [`Authenticator`] only restores
//!   a principal from the reference a login stored in the session
//! - Login and logout rotate the session ID

pub mod gate;

use std::fmt;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{Session, SessionError, SessionKey};
use crate::store::{StoreConnection, StoreError};

pub use gate::{authentication_gate, AuthGate};

/// Store kind under which [`StoreAuthenticator`] keeps principals.
pub const PRINCIPAL_KIND: &str = "principals";

/// Session key holding the authenticated principal reference.
pub const PRINCIPAL: SessionKey<PrincipalId> = SessionKey::new("principal");

/// Stable reference to a principal, as kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
}

/// Who is making the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(principal) => Some(principal),
            Identity::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("principal lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Restores principals from session references.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the reference no longer resolves.
    async fn restore(
        &self,
        id: &PrincipalId,
        store: &StoreConnection,
    ) -> Result<Option<Principal>, AuthError>;
}

/// Principals stored as JSON under `<collection>:principals:<id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreAuthenticator;

impl StoreAuthenticator {
    /// Record a principal so later requests can restore it.
    pub async fn save(
        store: &StoreConnection,
        principal: &Principal,
        ttl: std::time::Duration,
    ) -> Result<(), AuthError> {
        let raw = serde_json::to_string(principal).map_err(|e| AuthError::Lookup(e.to_string()))?;
        store
            .put(PRINCIPAL_KIND, principal.id.as_str(), &raw, ttl)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for StoreAuthenticator {
    async fn restore(
        &self,
        id: &PrincipalId,
        store: &StoreConnection,
    ) -> Result<Option<Principal>, AuthError> {
        let Some(raw) = store.get(PRINCIPAL_KIND, id.as_str()).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(principal) => Ok(Some(principal)),
            Err(e) => {
                tracing::warn!(principal = %id, error = %e, "Discarding undecodable principal");
                Ok(None)
            }
        }
    }
}

/// Bind `principal` to the session under a fresh session ID.
pub fn log_in(session: &Session, principal: &PrincipalId) -> Result<(), SessionError> {
    session.regenerate();
    session.insert(&PRINCIPAL, principal)
}

/// Drop the principal reference and rotate the session ID.
/// An anonymous session is left as it is.
pub fn log_out(session: &Session) -> bool {
    let was_logged_in = session.remove(&PRINCIPAL);
    if was_logged_in {
        session.regenerate();
    }
    was_logged_in
}
