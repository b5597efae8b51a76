//! Default version 1 API.
//!
//! Mounted under `/v1` by the binary when no other router is supplied.
//! Every handler runs behind the full chain, so the session, identity and
//! parsed body are already in place.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{log_out, Identity, Principal};
use crate::http::{AppError, ParsedBody};
use crate::session::{Session, SessionData};

/// What `GET /v1/session` reports about the caller's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub is_new: bool,
    pub expires_at_ms: u64,
    pub principal: Option<Principal>,
    pub data: SessionData,
}

pub fn router() -> Router {
    Router::new()
        .route("/session", get(show_session))
        .route("/session/logout", post(logout))
        .route("/echo", post(echo))
}

async fn show_session(session: Session, identity: Identity) -> Json<SessionView> {
    Json(SessionView {
        is_new: session.is_new(),
        expires_at_ms: session.expires_at_ms(),
        principal: identity.principal().cloned(),
        data: session.data(),
    })
}

async fn logout(session: Session) -> Result<StatusCode, AppError> {
    if log_out(&session) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::with_status(StatusCode::UNAUTHORIZED, "not logged in"))
    }
}

async fn echo(ParsedBody(body): ParsedBody) -> Json<Value> {
    Json(body)
}
