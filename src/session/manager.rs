//! Session resolution and persistence.
//!
//! # Responsibilities
//! - Resolve the session for a request from its verified cookie
//! - Persist mutated sessions when the response is ready
//! - Issue, refresh and clear the session cookie
//!
//! # State Transitions
//! ```text
//! no cookie / bad signature ─────────────┐
//! cookie → record missing/expired/corrupt ┼─→ Created (fresh ID)
//! cookie → store unreachable ────────────┘
//! cookie → live record ──────────────────→ Restored
//! ```
//!
//! # Design Decisions
//! - The store is the only source of truth; nothing is cached between requests
//! - A store read failure degrades to a fresh session instead of failing
//! - Writes replace the whole record (last write wins)
//! - A new session nobody wrote to gets a cookie but no record; the record
//!   appears on its first mutation

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::ServerSettings;
use crate::http::decode::RequestCookies;
use crate::http::error::AppError;
use crate::observability::metrics;
use crate::session::cookie::{expired_cookie, session_cookie, CookieSigner};
use crate::session::data::{now_ms, SessionId, SessionRecord};
use crate::session::handle::{CommitPlan, Session};
use crate::session::SessionError;
use crate::store::StoreConnection;

/// Store kind under which session records live.
pub const SESSION_KIND: &str = "sessions";

/// Loads, creates and saves sessions against the shared store.
#[derive(Clone)]
pub struct SessionManager {
    store: StoreConnection,
    signer: CookieSigner,
    cookie_name: String,
    duration: Duration,
}

impl SessionManager {
    pub fn new(store: StoreConnection, signer: CookieSigner, server: &ServerSettings) -> Self {
        Self {
            store,
            signer,
            cookie_name: server.cookie_name(),
            duration: server.session_duration(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Resolve the session for a verified cookie value, creating one if needed.
    pub async fn resolve(&self, cookie_value: Option<&str>) -> Session {
        let Some(id) = cookie_value.and_then(SessionId::parse) else {
            return self.create();
        };

        match self.load(&id).await {
            Ok(Some(record)) => {
                metrics::record_session("restored");
                Session::restored(id, record)
            }
            Ok(None) => self.create(),
            Err(e) => {
                tracing::warn!(error = %e, "Session store unavailable, starting a fresh session");
                metrics::record_session("store_unavailable");
                self.create()
            }
        }
    }

    fn create(&self) -> Session {
        metrics::record_session("created");
        Session::created(now_ms().saturating_add(self.duration_ms()))
    }

    /// Read a live record. Expired and undecodable records read as absent.
    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let Some(raw) = self.store.get(SESSION_KIND, id.as_str()).await? else {
            return Ok(None);
        };

        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable session record");
                return Ok(None);
            }
        };

        if record.is_expired(now_ms()) {
            metrics::record_session("expired");
            if let Err(e) = self.store.delete(SESSION_KIND, id.as_str()).await {
                tracing::debug!(error = %e, "Failed to delete expired session");
            }
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Persist the session and write any cookie change into `headers`.
    pub async fn commit(&self, session: &Session, headers: &mut HeaderMap) -> Result<(), SessionError> {
        match session.commit_plan(now_ms(), self.duration_ms()) {
            CommitPlan::Destroy { id, superseded } => {
                self.store.delete(SESSION_KIND, id.as_str()).await?;
                if let Some(old) = superseded {
                    self.forget(&old).await;
                }
                if let Some(cookie) = expired_cookie(&self.cookie_name) {
                    headers.append(SET_COOKIE, cookie);
                }
            }
            CommitPlan::Save {
                id,
                record,
                superseded,
            } => {
                let raw = serde_json::to_string(&record)?;
                self.store
                    .put(SESSION_KIND, id.as_str(), &raw, self.duration)
                    .await?;
                if let Some(old) = superseded {
                    self.forget(&old).await;
                }
                self.issue_cookie(&id, headers);
            }
            CommitPlan::Issue { id } => self.issue_cookie(&id, headers),
            CommitPlan::Touch { id } => {
                if let Err(e) = self.store.expire(SESSION_KIND, id.as_str(), self.duration).await {
                    tracing::debug!(error = %e, "Failed to refresh session expiry");
                }
            }
        }
        Ok(())
    }

    fn issue_cookie(&self, id: &SessionId, headers: &mut HeaderMap) {
        let signed = self.signer.sign(id.as_str());
        if let Some(cookie) = session_cookie(&self.cookie_name, &signed, self.duration) {
            headers.append(SET_COOKIE, cookie);
        }
    }

    async fn forget(&self, id: &SessionId) {
        if let Err(e) = self.store.delete(SESSION_KIND, id.as_str()).await {
            tracing::warn!(error = %e, "Failed to delete superseded session");
        }
    }
}

/// Session stage of the request chain.
pub async fn session_layer(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_value = request
        .extensions()
        .get::<RequestCookies>()
        .and_then(|cookies| cookies.signed(manager.cookie_name()))
        .map(str::to_owned);

    let session = manager.resolve(cookie_value.as_deref()).await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;
    manager
        .commit(&session, response.headers_mut())
        .await
        .map_err(AppError::from)?;

    Ok(response)
}
