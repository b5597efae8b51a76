//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Connect store (or retry in background) → Bind → Announce
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Teardown
//!
//! Shutdown (shutdown.rs):
//!     Close store (once) → Exit 0
//! ```
//!
//! # Design Decisions
//! - Listener starts even when the store is down
//! - No connection draining

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{spawn_signal_handler, Teardown};
pub use signals::{TerminationSignal, TerminationSignals};
pub use startup::{announce, connect_store};
