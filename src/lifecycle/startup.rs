//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the store, or keep retrying it in the background
//! - Announce readiness once the listener is bound
//!
//! # Design Decisions
//! - The listener never waits for the store: `/heartbeat` must answer
//!   while the store is still unreachable
//! - Reconnect attempts are paced by [`RetryPolicy`]

use tokio::task::JoinHandle;

use crate::config::{DatabaseSettings, ServerSettings};
use crate::resilience::RetryPolicy;
use crate::store::{StoreConnection, StoreError};

/// Try the store once; on failure retry in the background until connected or closed.
///
/// Returns the retry task when one was started.
pub async fn connect_store(
    store: &StoreConnection,
    settings: &DatabaseSettings,
) -> Option<JoinHandle<()>> {
    match store.connect().await {
        Ok(()) => {
            tracing::info!(target = %store.describe(), "Store connected");
            None
        }
        Err(e) => {
            tracing::error!(target = %store.describe(), error = %e, "Store connection failed");
            let store = store.clone();
            let policy = RetryPolicy::from(settings);
            Some(tokio::spawn(reconnect(store, policy)))
        }
    }
}

async fn reconnect(store: StoreConnection, policy: RetryPolicy) {
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        tokio::time::sleep(policy.delay(attempt)).await;

        match store.connect().await {
            Ok(()) => {
                tracing::info!(target = %store.describe(), attempt, "Store connected");
                return;
            }
            Err(StoreError::Closed) => {
                tracing::debug!("Store closed, giving up reconnect");
                return;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Store reconnect failed");
            }
        }
    }
}

/// The readiness line.
pub fn listening_message(server: &ServerSettings, port: u16) -> String {
    format!("{} is listening on port {}...", server.name, port)
}

pub fn announce(server: &ServerSettings, port: u16) {
    tracing::info!(port, "{}", listening_message(server, port));
}
