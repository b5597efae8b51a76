//! Shared utilities for gateway integration tests.
#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use cookie::Cookie;
use serde::Deserialize;
use serde_json::Value;
use tower::ServiceExt;

use session_gateway::auth::{log_in, Identity, Principal, PrincipalId, StoreAuthenticator};
use session_gateway::config::{Environment, Settings};
use session_gateway::http::{build_router, AppError, ParsedBody, ServerContext};
use session_gateway::session::{Session, SessionKey};
use session_gateway::store::{MemoryStore, StoreConnection, StoreError};

pub const SERVER_NAME: &str = "Test";
pub const COOKIE_NAME: &str = "Test Cookie";

pub const VISITS: SessionKey<u64> = SessionKey::new("visits");
pub const VALUE: SessionKey<String> = SessionKey::new("value");

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.name = SERVER_NAME.into();
    settings.server.session_duration_seconds = 60;
    settings.server.body_limit_bytes = 1024;
    settings.database.collection = "it".into();
    settings
}

/// Context over a fresh in-memory store.
pub fn context(environment: Environment) -> (ServerContext, MemoryStore) {
    let memory = MemoryStore::new();
    let store = StoreConnection::with_memory("it", memory.clone());
    (ServerContext::new(settings(), environment, store), memory)
}

/// The gateway around [`test_api`].
pub fn app(context: &ServerContext) -> Router {
    build_router(context, test_api())
}

/// Versioned routes exercising each stage.
pub fn test_api() -> Router {
    Router::new()
        .route("/visits", get(visits))
        .route("/value", get(read_value).post(write_value))
        .route("/login", post(login))
        .route("/whoami", get(whoami))
        .route("/echo", post(echo))
        .route("/typed", post(typed))
        .route("/store-failure", get(store_failure))
        .route("/panic", get(explode))
}

async fn visits(session: Session) -> Result<String, AppError> {
    let count = session.get(&VISITS).unwrap_or(0) + 1;
    session.insert(&VISITS, &count)?;
    Ok(count.to_string())
}

async fn read_value(session: Session) -> String {
    session.get(&VALUE).unwrap_or_default()
}

async fn write_value(session: Session, ParsedBody(body): ParsedBody) -> Result<StatusCode, AppError> {
    let value = body["value"].as_str().unwrap_or_default().to_string();
    session.insert(&VALUE, &value)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn login(
    session: Session,
    store: StoreConnection,
    ParsedBody(body): ParsedBody,
) -> Result<StatusCode, AppError> {
    let Some(user) = body["user"].as_str() else {
        return Err(AppError::with_status(StatusCode::BAD_REQUEST, "user required"));
    };
    let principal = Principal {
        id: PrincipalId::new(user),
        display_name: user.to_uppercase(),
    };
    StoreAuthenticator::save(&store, &principal, Duration::from_secs(60)).await?;
    log_in(&session, &principal.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn whoami(identity: Identity) -> Result<Json<Principal>, AppError> {
    identity
        .principal()
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::with_status(StatusCode::UNAUTHORIZED, "anonymous"))
}

async fn echo(ParsedBody(body): ParsedBody) -> Json<Value> {
    Json(body)
}

#[derive(Deserialize)]
struct Needs {
    n: u32,
}

/// Rejections from axum's own extractors never become an `AppError`.
async fn typed(Json(needs): Json<Needs>) -> String {
    needs.n.to_string()
}

async fn store_failure() -> Result<StatusCode, AppError> {
    Err(StoreError::Closed.into())
}

async fn explode() -> StatusCode {
    panic!("handler exploded");
}

pub fn request(method: Method, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn with_cookie(method: Method, uri: &str, cookie: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(uri: &str, cookie: Option<&str>, body: Value) -> Request {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, request: Request) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Encoded `name=value` pair of the session cookie set on `response`, ready to replay.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| {
            Cookie::parse_encoded(v.to_string()).is_ok_and(|c| c.name() == COOKIE_NAME)
        })
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Session ID inside a `name=s:<id>.<sig>` pair, encoded or not.
pub fn session_id(cookie: &str) -> String {
    let parsed = Cookie::parse_encoded(cookie.to_string()).unwrap();
    let signed = parsed.value().strip_prefix("s:").unwrap();
    signed.rsplit_once('.').unwrap().0.to_string()
}
