//! Session identifiers, typed keys and the persisted record.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Random bytes per session ID (encodes to 32 characters).
const SESSION_ID_BYTES: usize = 24;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        let bytes: [u8; SESSION_ID_BYTES] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept an identifier recovered from a verified cookie.
    ///
    /// Rejects anything that could not have been produced by [`SessionId::generate`],
    /// so store keys never contain separators or whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A documented, typed session key.
///
/// ```
/// use session_gateway::session::SessionKey;
///
/// const VISITS: SessionKey<u64> = SessionKey::new("visits");
/// assert_eq!(VISITS.name(), "visits");
/// ```
pub struct SessionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SessionKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for SessionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SessionKey<T> {}

impl<T> fmt::Debug for SessionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionKey").field(&self.name).finish()
    }
}

/// Session-scoped values, stored as JSON under their key names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(BTreeMap<String, serde_json::Value>);

impl SessionData {
    /// Typed read. A stored value of the wrong shape reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &SessionKey<T>) -> Option<T> {
        let raw = self.0.get(key.name())?;
        match serde_json::from_value(raw.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key = key.name(), error = %e, "Session value has unexpected shape");
                None
            }
        }
    }

    pub fn insert<T: Serialize>(
        &mut self,
        key: &SessionKey<T>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_value(value)?;
        self.0.insert(key.name().to_string(), raw);
        Ok(())
    }

    /// Returns whether the key was present.
    pub fn remove<T>(&mut self, key: &SessionKey<T>) -> bool {
        self.0.remove(key.name()).is_some()
    }

    pub fn contains<T>(&self, key: &SessionKey<T>) -> bool {
        self.0.contains_key(key.name())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// What is written to the store for each session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub data: SessionData,
    /// Unix epoch milliseconds.
    pub expires_at_ms: u64,
}

impl SessionRecord {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
