//! Process teardown.
//!
//! On the first termination signal the store connection is closed and the
//! process exits with code 0. In-flight requests are not drained; any that
//! touch the store afterwards fail with `StoreError::Closed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::signals::{TerminationSignal, TerminationSignals};
use crate::store::StoreConnection;

/// Cleanup that runs at most once.
pub struct Teardown {
    store: StoreConnection,
    fired: AtomicBool,
}

impl Teardown {
    pub fn new(store: StoreConnection) -> Self {
        Self {
            store,
            fired: AtomicBool::new(false),
        }
    }

    /// Close the store. Returns `true` only for the call that did the work.
    pub fn run(&self, signal: TerminationSignal) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!(%signal, "Teardown already ran");
            return false;
        }
        tracing::info!(%signal, "Termination signal received, closing store");
        self.store.close();
        true
    }

    pub fn has_run(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Wait for SIGINT/SIGTERM, tear down, and exit the process.
pub fn spawn_signal_handler(
    mut signals: TerminationSignals,
    teardown: Arc<Teardown>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = signals.recv().await;
        teardown.run(signal);
        tracing::info!("Shutdown complete");
        std::process::exit(0);
    })
}
