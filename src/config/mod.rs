//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Environment:
//!     PORT            → overrides server.port
//!     APP_ENV/NODE_ENV → Environment (error detail, access log)
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, ConfigError};
pub use schema::{
    effective_port, DatabaseSettings, Environment, ObservabilitySettings, ServerSettings,
    Settings, StoreKind,
};
