//! HTTP server setup and the request chain.
//!
//! # Responsibilities
//! - Create the Axum router: heartbeat, versioned API, not-found fallback
//! - Wire up the stages in order around it
//! - Bind the router to a listener
//!
//! # Request Chain
//! ```text
//! cors → request id → access log (dev) → metrics → error normalizer
//!      → panic catcher → decoder → session → auth gate → store context
//!      → /heartbeat | /v1/* | not found
//! ```
//!
//! # Design Decisions
//! - Every stage is a separate layer; the router sees them in a fixed order
//! - Errors travel up as `AppError` responses and are rendered once
//! - No graceful drain: the process exits from the signal task

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use crate::auth::{authentication_gate, AuthGate, Authenticator, StoreAuthenticator};
use crate::config::{Environment, Settings};
use crate::http::context::attach_store;
use crate::http::decode::{decode_layer, Decoder};
use crate::http::error::{normalize_errors, not_found, panic_response, ErrorPolicy};
use crate::http::{cors, request};
use crate::observability::metrics;
use crate::session::{session_layer, CookieSigner, SessionManager};
use crate::store::StoreConnection;

/// Prefix the versioned API is mounted under.
pub const API_PREFIX: &str = "/v1";

/// Liveness route.
pub const HEARTBEAT_PATH: &str = "/heartbeat";

/// Process-wide state shared by every stage.
#[derive(Clone)]
pub struct ServerContext {
    pub settings: Arc<Settings>,
    pub environment: Environment,
    pub store: StoreConnection,
    pub authenticator: Arc<dyn Authenticator>,
}

impl ServerContext {
    pub fn new(settings: Settings, environment: Environment, store: StoreConnection) -> Self {
        Self {
            settings: Arc::new(settings),
            environment,
            store,
            authenticator: Arc::new(StoreAuthenticator),
        }
    }

    /// Replace the principal lookup used by the auth gate.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::new(self.environment.expose_error_detail())
    }

    pub fn cookie_signer(&self) -> CookieSigner {
        CookieSigner::new(self.settings.server.session_secret())
    }
}

/// Always succeeds, never touches the store.
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Build the full gateway around the versioned `api` router.
pub fn build_router(context: &ServerContext, api: Router) -> Router {
    let signer = context.cookie_signer();
    let decoder = Decoder::new(signer.clone(), context.settings.server.body_limit_bytes);
    let sessions = SessionManager::new(context.store.clone(), signer, &context.settings.server);
    let gate = AuthGate::new(context.authenticator.clone(), context.store.clone());

    let router = Router::new()
        .route(HEARTBEAT_PATH, get(heartbeat))
        .nest(API_PREFIX, api)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(middleware::from_fn_with_state(context.store.clone(), attach_store))
        .layer(middleware::from_fn_with_state(gate, authentication_gate))
        .layer(middleware::from_fn_with_state(sessions, session_layer))
        .layer(middleware::from_fn_with_state(decoder, decode_layer))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(
            context.error_policy(),
            normalize_errors,
        ))
        .layer(middleware::from_fn(metrics::track_requests));

    let router = if context.environment.access_log() {
        request::with_access_log(router)
    } else {
        router
    };

    cors::apply(request::with_request_id(router))
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    context: ServerContext,
}

impl GatewayServer {
    pub fn new(context: ServerContext, api: Router) -> Self {
        let router = build_router(&context, api);
        Self { router, context }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Serve until the process exits.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::debug!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
