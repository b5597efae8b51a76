//! Session gateway library.
//!
//! An HTTP entry point that gives every client a store-backed session,
//! restores its identity, and dispatches to a versioned API under `/v1`.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod session;
pub mod store;
pub mod v1;

pub use config::schema::{Environment, Settings};
pub use http::{GatewayServer, ServerContext};
pub use store::StoreConnection;
