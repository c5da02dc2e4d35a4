//! Error model.
//!
//! # Data Flow
//! ```text
//! handler returns Err(BoxError)        panic caught by the engine
//!     │                                     │
//!     └──────────► HttpError::coerce ◄──────┘ (500 + cause + trace)
//!                       │
//!                       ▼
//!               error handler (default_error_handler or user supplied)
//!                       │
//!                       ▼
//!               log (cause, trace) + client payload (status, message)
//! ```
//!
//! # Design Decisions
//! - The public message is the only text a client ever sees
//! - Causes and traces go to logs only
//! - Any error converts into a 500 whose cause is the original error

mod handler;

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;

pub use handler::{default_error_handler, ErrorHandler};

/// Type-erased error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error with an HTTP status and a client-safe message.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: Cow<'static, str>,
    internal: Option<BoxError>,
    stack: Option<String>,
}

impl HttpError {
    /// Create an error whose message is the canonical reason phrase.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: Cow::Borrowed(status.canonical_reason().unwrap_or("")),
            internal: None,
            stack: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Replace the public message.
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the cause that is logged but never shown to clients.
    pub fn with_internal(mut self, cause: impl Into<BoxError>) -> Self {
        self.internal = Some(cause.into());
        self
    }

    pub(crate) fn with_stack(mut self, stack: String) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn internal(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.internal.as_deref()
    }

    /// Diagnostic trace, present only for recovered panics.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// The first `HttpError` in `err` or its source chain.
    pub fn find<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a HttpError> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(http) = e.downcast_ref::<HttpError>() {
                return Some(http);
            }
            current = e.source();
        }
        None
    }

    /// Turn any handler error into an `HttpError`.
    ///
    /// An `HttpError` is returned unchanged. Otherwise the source chain is
    /// searched for one and its status and message are reused, with the
    /// original error kept as the cause. Anything else becomes a 500.
    pub fn coerce(err: BoxError) -> HttpError {
        let err = match err.downcast::<HttpError>() {
            Ok(http) => return *http,
            Err(err) => err,
        };

        let (status, message) = match HttpError::find(&*err) {
            Some(http) => (http.status, http.message.clone()),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Cow::Borrowed("Internal Server Error"),
            ),
        };

        HttpError {
            status,
            message,
            internal: Some(err),
            stack: None,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.internal {
            Some(cause) => write!(f, "{}", cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.internal
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}
