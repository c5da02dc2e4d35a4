//! HTTP Basic authentication.

use std::fmt;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::HeaderValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::error::HttpError;
use crate::handler::{from_fn, BoxHandler, Handler, HandlerResult, Middleware};

type Validator = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Settings for [`BasicAuthConfig::into_middleware`].
#[derive(Clone)]
pub struct BasicAuthConfig {
    /// Decides whether a user/password pair may pass.
    pub is_allowed: Validator,
    /// Realm announced in `WWW-Authenticate`; `"restricted"` when empty.
    pub realm: String,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl BasicAuthConfig {
    pub fn new<F>(is_allowed: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            is_allowed: Arc::new(is_allowed),
            realm: String::new(),
        }
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    pub fn into_middleware(self) -> Middleware {
        let challenge = challenge(&self.realm);
        let is_allowed = self.is_allowed;

        from_fn(move |next| {
            Arc::new(BasicAuth {
                next,
                is_allowed: is_allowed.clone(),
                challenge: challenge.clone(),
            })
        })
    }
}

/// Require Basic credentials accepted by `is_allowed`.
///
/// Requests with missing or rejected credentials get `401 Unauthorized` and
/// a `WWW-Authenticate` challenge naming `realm`.
pub fn basic_auth<F>(realm: &str, is_allowed: F) -> Middleware
where
    F: Fn(&str, &str) -> bool + Send + Sync + 'static,
{
    BasicAuthConfig::new(is_allowed).realm(realm).into_middleware()
}

struct BasicAuth {
    next: BoxHandler,
    is_allowed: Validator,
    challenge: HeaderValue,
}

impl Handler for BasicAuth {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let allowed = c
                .header(AUTHORIZATION.as_str())
                .and_then(parse_basic_auth)
                .is_some_and(|(user, password)| (self.is_allowed)(&user, &password));
            if allowed {
                return self.next.call(c).await;
            }

            c.response_mut()
                .headers_mut()
                .insert(WWW_AUTHENTICATE, self.challenge.clone());
            Err(HttpError::unauthorized().into())
        })
    }
}

const DEFAULT_REALM: &str = "restricted";

/// Build the `WWW-Authenticate` value for `realm`.
///
/// A realm that cannot travel as visible ASCII is replaced by the default
/// one, with a warning.
fn challenge(realm: &str) -> HeaderValue {
    let realm = if realm.is_empty() { DEFAULT_REALM } else { realm };
    // Quoted with escapes, e.g. `Basic realm="Admin \"area\""`.
    let value = format!("Basic realm={:?}", realm);
    match HeaderValue::from_str(&value) {
        Ok(header) if header.to_str().is_ok() => header,
        _ => {
            tracing::warn!(
                realm = %realm,
                fallback = DEFAULT_REALM,
                "Basic auth realm is not a valid header value, using fallback"
            );
            HeaderValue::from_static("Basic realm=\"restricted\"")
        }
    }
}

/// Decode an `Authorization: Basic ...` value into user and password.
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
