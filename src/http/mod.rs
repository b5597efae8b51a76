//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, stage order)
//!     → cors.rs (cross-origin headers, preflight)
//!     → request.rs (request ID, access log)
//!     → error.rs (normalizer wraps everything below)
//!     → decode.rs (body and cookies)
//!     → [session, auth gate]
//!     → context.rs (store handle)
//!     → handler or not-found fallback
//! ```

pub mod context;
pub mod cors;
pub mod decode;
pub mod error;
pub mod request;
pub mod server;

pub use decode::{ParsedBody, RequestCookies};
pub use error::{AppError, ErrorPolicy};
pub use request::X_REQUEST_ID;
pub use server::{build_router, GatewayServer, ServerContext, API_PREFIX, HEARTBEAT_PATH};
