//! Signed cookie values and `Set-Cookie` rendering.
//!
//! Signed values take the form `s:<value>.<signature>`, where the signature
//! is the URL-safe, unpadded base64 HMAC-SHA256 of `<value>` keyed by the
//! process-wide session secret. `Set-Cookie` values are built with the
//! `cookie` crate and percent-encoded, so the space in `"<name> Cookie"` and
//! the `:` of the signed prefix travel as `%20` and `%3A`.

use std::time::Duration;

use axum::http::HeaderValue;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cookie::Cookie;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_PREFIX: &str = "s:";

/// Signs and verifies cookie values.
#[derive(Clone)]
pub struct CookieSigner {
    keyed: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let keyed =
            HmacSha256::new_from_slice(secret.as_ref()).expect("HMAC can take key of any size");
        Self { keyed }
    }

    /// `s:<value>.<signature>`
    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(value.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{SIGNED_PREFIX}{value}.{signature}")
    }

    /// Recover the value of a signed cookie. `None` on any mismatch.
    pub fn unsign(&self, raw: &str) -> Option<String> {
        let body = raw.strip_prefix(SIGNED_PREFIX)?;
        let (value, signature) = body.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.keyed.clone();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(value.to_string())
    }

    /// Whether a raw cookie value claims to be signed.
    pub fn is_signed(raw: &str) -> bool {
        raw.starts_with(SIGNED_PREFIX)
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSigner(..)")
    }
}

/// `Set-Cookie` for a live session.
pub fn session_cookie(name: &str, value: &str, max_age: Duration) -> Option<HeaderValue> {
    let seconds = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .max_age(cookie::time::Duration::seconds(seconds))
        .build();
    HeaderValue::from_str(&cookie.encoded().to_string()).ok()
}

/// `Set-Cookie` that makes the client drop the session cookie.
pub fn expired_cookie(name: &str) -> Option<HeaderValue> {
    let cookie = Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .removal()
        .build();
    HeaderValue::from_str(&cookie.encoded().to_string()).ok()
}
