//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → http/decode.rs verifies the signed cookie (cookie.rs)
//!     → manager.rs resolves Session (load from store or create)
//!     → Session (handle.rs) inserted into request extensions
//!     → handlers read/write typed keys (data.rs)
//!
//! Response
//!     → manager.rs commits: save / touch / delete
//!     → signed Set-Cookie when created or mutated
//! ```

pub mod cookie;
pub mod data;
pub mod handle;
pub mod manager;

use thiserror::Error;

use crate::store::StoreError;

pub use cookie::CookieSigner;
pub use data::{SessionData, SessionId, SessionKey, SessionRecord};
pub use handle::{Session, SessionOrigin};
pub use manager::{session_layer, SessionManager, SESSION_KIND};

/// Errors raised while reading or writing sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
}
