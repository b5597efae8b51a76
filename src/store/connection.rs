//! The shared store connection handle.
//!
//! # Responsibilities
//! - Establish the backend selected by `database.backend`
//! - Namespace keys under `database.collection`
//! - Close exactly once and refuse work afterwards
//!
//! # Design Decisions
//! - Starts disconnected; requests see `NotConnected` until connect succeeds
//! - In-flight calls keep their backend alive until they finish
//! - `close` is idempotent and reports whether this call performed it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::config::{DatabaseSettings, StoreKind};
use crate::observability::metrics;
use crate::store::memory::MemoryStore;
use crate::store::redis::{connection_url, redacted_url, RedisStore};
use crate::store::StoreError;

/// A live backend.
pub enum StoreBackend {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    async fn ping(&self) -> Result<(), StoreError> {
        match self {
            StoreBackend::Redis(store) => store.ping().await,
            StoreBackend::Memory(_) => Ok(()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            StoreBackend::Redis(store) => store.get(key).await,
            StoreBackend::Memory(store) => Ok(store.get(key)),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        match self {
            StoreBackend::Redis(store) => store.put(key, value, ttl).await,
            StoreBackend::Memory(store) => {
                store.put(key, value, ttl);
                Ok(())
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        match self {
            StoreBackend::Redis(store) => store.expire(key, ttl).await,
            StoreBackend::Memory(store) => {
                store.expire(key, ttl);
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            StoreBackend::Redis(store) => store.delete(key).await,
            StoreBackend::Memory(store) => {
                store.delete(key);
                Ok(())
            }
        }
    }
}

struct ConnectionInner {
    settings: DatabaseSettings,
    backend: ArcSwapOption<StoreBackend>,
    closed: AtomicBool,
}

/// Cloneable handle to the process-wide store connection.
#[derive(Clone)]
pub struct StoreConnection {
    inner: Arc<ConnectionInner>,
}

impl StoreConnection {
    /// Create a disconnected handle. Call [`StoreConnection::connect`] to use it.
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                settings,
                backend: ArcSwapOption::empty(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A connected handle over an existing in-memory store.
    pub fn with_memory(collection: impl Into<String>, store: MemoryStore) -> Self {
        let settings = DatabaseSettings {
            backend: StoreKind::Memory,
            collection: collection.into(),
            ..DatabaseSettings::default()
        };
        let connection = Self::new(settings);
        connection
            .inner
            .backend
            .store(Some(Arc::new(StoreBackend::Memory(store))));
        connection
    }

    /// Human-readable target with credentials masked.
    pub fn describe(&self) -> String {
        match self.inner.settings.backend {
            StoreKind::Redis => redacted_url(&self.inner.settings),
            StoreKind::Memory => format!("memory://{}", self.inner.settings.collection),
        }
    }

    /// Establish the backend. A no-op when already connected.
    pub async fn connect(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if self.is_connected() {
            return Ok(());
        }

        let backend = match self.inner.settings.backend {
            StoreKind::Redis => {
                let url = connection_url(&self.inner.settings)?;
                StoreBackend::Redis(RedisStore::connect(&url).await?)
            }
            StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
        };

        self.inner.backend.store(Some(Arc::new(backend)));

        // close() may have run while the handshake was pending
        if self.is_closed() {
            self.inner.backend.store(None);
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.inner.backend.load().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Close the connection. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let previous = self.inner.backend.swap(None);
        tracing::info!(
            target = %self.describe(),
            was_connected = previous.is_some(),
            "Store connection closed"
        );
        true
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let backend = self.backend()?;
        observe("ping", backend.ping().await)
    }

    pub async fn get(&self, kind: &str, id: &str) -> Result<Option<String>, StoreError> {
        let backend = self.backend()?;
        observe("get", backend.get(&self.key(kind, id)).await)
    }

    /// Write the whole value, replacing any previous one.
    pub async fn put(
        &self,
        kind: &str,
        id: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let backend = self.backend()?;
        observe("put", backend.put(&self.key(kind, id), value, ttl).await)
    }

    pub async fn expire(&self, kind: &str, id: &str, ttl: Duration) -> Result<(), StoreError> {
        let backend = self.backend()?;
        observe("expire", backend.expire(&self.key(kind, id), ttl).await)
    }

    pub async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        let backend = self.backend()?;
        observe("delete", backend.delete(&self.key(kind, id)).await)
    }

    fn backend(&self) -> Result<Arc<StoreBackend>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        self.inner.backend.load_full().ok_or(StoreError::NotConnected)
    }

    fn key(&self, kind: &str, id: &str) -> String {
        format!("{}:{}:{}", self.inner.settings.collection, kind, id)
    }
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("target", &self.describe())
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn observe<T>(op: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if result.is_err() {
        metrics::record_store_error(op);
    }
    result
}
