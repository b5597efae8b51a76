//! Per-request session handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::http::error::AppError;
use crate::session::data::{SessionData, SessionId, SessionKey, SessionRecord};
use crate::session::SessionError;

/// How the session was resolved for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// No usable cookie; minted for this request.
    Created,
    /// Loaded from the store by cookie ID.
    Restored,
}

#[derive(Debug)]
struct SessionState {
    id: SessionId,
    data: SessionData,
    expires_at_ms: u64,
    origin: SessionOrigin,
    modified: bool,
    destroyed: bool,
    superseded: Option<SessionId>,
}

/// What the manager must do with the session once the response is ready.
#[derive(Debug)]
pub(crate) enum CommitPlan {
    Destroy {
        id: SessionId,
        superseded: Option<SessionId>,
    },
    Save {
        id: SessionId,
        record: SessionRecord,
        superseded: Option<SessionId>,
    },
    /// Fresh and untouched: cookie only, nothing stored yet.
    Issue {
        id: SessionId,
    },
    Touch {
        id: SessionId,
    },
}

/// The session attached to a request.
///
/// Cloning shares the same state, so changes made by a handler are visible
/// to the session layer when the response comes back through it.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub(crate) fn created(expires_at_ms: u64) -> Self {
        Self::from_state(SessionState {
            id: SessionId::generate(),
            data: SessionData::default(),
            expires_at_ms,
            origin: SessionOrigin::Created,
            modified: false,
            destroyed: false,
            superseded: None,
        })
    }

    pub(crate) fn restored(id: SessionId, record: SessionRecord) -> Self {
        Self::from_state(SessionState {
            id,
            data: record.data,
            expires_at_ms: record.expires_at_ms,
            origin: SessionOrigin::Restored,
            modified: false,
            destroyed: false,
            superseded: None,
        })
    }

    fn from_state(state: SessionState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> SessionId {
        self.state().id.clone()
    }

    pub fn origin(&self) -> SessionOrigin {
        self.state().origin
    }

    pub fn is_new(&self) -> bool {
        self.origin() == SessionOrigin::Created
    }

    pub fn is_modified(&self) -> bool {
        self.state().modified
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Unix epoch milliseconds.
    pub fn expires_at_ms(&self) -> u64 {
        self.state().expires_at_ms
    }

    /// Copy of the current values.
    pub fn data(&self) -> SessionData {
        self.state().data.clone()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &SessionKey<T>) -> Option<T> {
        self.state().data.get(key)
    }

    pub fn contains<T>(&self, key: &SessionKey<T>) -> bool {
        self.state().data.contains(key)
    }

    pub fn insert<T: Serialize>(&self, key: &SessionKey<T>, value: &T) -> Result<(), SessionError> {
        let mut state = self.state();
        state.data.insert(key, value)?;
        state.modified = true;
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn remove<T>(&self, key: &SessionKey<T>) -> bool {
        let mut state = self.state();
        let removed = state.data.remove(key);
        state.modified |= removed;
        removed
    }

    pub fn clear(&self) {
        let mut state = self.state();
        if !state.data.is_empty() {
            state.data.clear();
            state.modified = true;
        }
    }

    /// Move the data to a fresh ID. The old record is dropped on commit.
    pub fn regenerate(&self) {
        let mut state = self.state();
        let old = std::mem::replace(&mut state.id, SessionId::generate());
        if state.origin == SessionOrigin::Restored && state.superseded.is_none() {
            state.superseded = Some(old);
        }
        state.modified = true;
    }

    /// Delete the session from the store and clear the client cookie.
    pub fn destroy(&self) {
        let mut state = self.state();
        state.data.clear();
        state.destroyed = true;
    }

    pub(crate) fn commit_plan(&self, now_ms: u64, duration_ms: u64) -> CommitPlan {
        let mut state = self.state();

        if state.destroyed {
            return CommitPlan::Destroy {
                id: state.id.clone(),
                superseded: state.superseded.take(),
            };
        }

        state.expires_at_ms = now_ms.saturating_add(duration_ms);

        match (state.origin, state.modified) {
            (SessionOrigin::Restored, false) => CommitPlan::Touch {
                id: state.id.clone(),
            },
            (SessionOrigin::Created, false) => CommitPlan::Issue {
                id: state.id.clone(),
            },
            (_, true) => CommitPlan::Save {
                id: state.id.clone(),
                record: SessionRecord {
                    data: state.data.clone(),
                    expires_at_ms: state.expires_at_ms,
                },
                superseded: state.superseded.take(),
            },
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::SessionUnavailable)
    }
}
