//! Persistent store subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle (startup.rs)
//!     → StoreConnection::connect (redis.rs or memory.rs backend)
//!     → handle shared by SessionManager and every request's extensions
//!
//! Shutdown (signal):
//!     → StoreConnection::close (exactly once)
//!     → later calls fail with StoreError::Closed
//! ```
//!
//! # Design Decisions
//! - One connection handle per process, cloned cheaply (Arc inside)
//! - Backend swapped atomically so connect/close never block requests
//! - Keys are namespaced: `<collection>:<kind>:<id>`
//! - Values are opaque strings; callers own the encoding

pub mod connection;
pub mod memory;
pub mod redis;

use std::time::Duration;

use thiserror::Error;

pub use connection::{StoreBackend, StoreConnection};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by the store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connect has not succeeded yet.
    #[error("store connection is not established")]
    NotConnected,

    /// The connection was closed during shutdown.
    #[error("store connection closed")]
    Closed,

    /// The configured host/port/credentials do not form a valid address.
    #[error("invalid store address: {0}")]
    InvalidTarget(String),

    #[error("store connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}
