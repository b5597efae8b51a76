//! Body and cookie decoding.
//!
//! # Responsibilities
//! - Parse JSON and form-encoded bodies into [`ParsedBody`]
//! - Parse the `Cookie` header into [`RequestCookies`], verifying signed values
//! - Put the raw body back so handlers may use their own extractors
//!
//! # Design Decisions
//! - Unknown content types are not buffered; the body is passed through
//! - A cookie with a bad signature is dropped, not reported
//! - First occurrence of a cookie name wins
//! - Cookie names and values are percent-decoded by the `cookie` crate

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};

use crate::http::error::AppError;
use crate::session::CookieSigner;

/// The decoded request body. An empty object when there was nothing to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl Default for ParsedBody {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<ParsedBody>().cloned().unwrap_or_default())
    }
}

/// Cookies sent with the request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    plain: BTreeMap<String, String>,
    signed: BTreeMap<String, String>,
}

impl RequestCookies {
    /// Parse every `Cookie` header, verifying `s:`-prefixed values with `signer`.
    /// Names and values are percent-decoded first.
    pub fn parse(headers: &HeaderMap, signer: &CookieSigner) -> Self {
        let mut cookies = Self::default();

        let parsed = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse_encoded(value))
            .filter_map(Result::ok);

        for cookie in parsed {
            let name = cookie.name();
            let value = cookie.value_trimmed();
            if name.is_empty()
                || cookies.plain.contains_key(name)
                || cookies.signed.contains_key(name)
            {
                continue;
            }

            if CookieSigner::is_signed(value) {
                match signer.unsign(value) {
                    Some(verified) => {
                        cookies.signed.insert(name.to_string(), verified);
                    }
                    None => tracing::debug!(cookie = name, "Ignoring cookie with invalid signature"),
                }
            } else {
                cookies.plain.insert(name.to_string(), value.to_string());
            }
        }
        cookies
    }

    /// Unsigned cookie value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.plain.get(name).map(String::as_str)
    }

    /// Value of a signed cookie whose signature checked out.
    pub fn signed(&self, name: &str) -> Option<&str> {
        self.signed.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.signed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
}

impl BodyFormat {
    fn of(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/json" || essence.ends_with("+json") {
            Some(BodyFormat::Json)
        } else if essence == "application/x-www-form-urlencoded" {
            Some(BodyFormat::Form)
        } else {
            None
        }
    }

    fn parse(self, bytes: &[u8]) -> Result<ParsedBody, AppError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ParsedBody::default());
        }
        match self {
            BodyFormat::Json => serde_json::from_slice(bytes)
                .map(ParsedBody)
                .map_err(AppError::MalformedBody),
            BodyFormat::Form => Ok(ParsedBody(parse_form(bytes))),
        }
    }
}

/// Form fields as a JSON object. Repeated names collect into an array.
fn parse_form(bytes: &[u8]) -> Value {
    let mut fields = Map::new();
    for (name, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(name.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(name.into_owned(), value);
            }
        }
    }
    Value::Object(fields)
}

/// Decoder configuration shared by every request.
#[derive(Debug, Clone)]
pub struct Decoder {
    signer: CookieSigner,
    body_limit: usize,
}

impl Decoder {
    pub fn new(signer: CookieSigner, body_limit: usize) -> Self {
        Self { signer, body_limit }
    }

    async fn read_body(&self, headers: &HeaderMap, body: Body) -> Result<Bytes, AppError> {
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.body_limit) {
            return Err(AppError::PayloadTooLarge {
                limit: self.body_limit,
            });
        }

        let collected = Limited::new(body, self.body_limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    AppError::PayloadTooLarge {
                        limit: self.body_limit,
                    }
                } else {
                    AppError::BodyRead(e.to_string())
                }
            })?;
        Ok(collected.to_bytes())
    }
}

/// Body/cookie stage of the request chain.
pub async fn decode_layer(
    State(decoder): State<Decoder>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let cookies = RequestCookies::parse(&parts.headers, &decoder.signer);

    let (parsed, body) = match BodyFormat::of(&parts.headers) {
        Some(format) => {
            let bytes = decoder.read_body(&parts.headers, body).await?;
            (format.parse(&bytes)?, Body::from(bytes))
        }
        None => (ParsedBody::default(), body),
    };

    parts.extensions.insert(cookies);
    parts.extensions.insert(parsed);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
