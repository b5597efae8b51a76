//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store connect fails at startup:
//!     → lifecycle/startup.rs retries in the background
//!     → retry.rs paces the attempts from the database settings
//! ```

pub mod retry;

pub use retry::RetryPolicy;
