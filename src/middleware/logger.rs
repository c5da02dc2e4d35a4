//! Access log middleware.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::context::Context;
use crate::engine::Abort;
use crate::error::HttpError;
use crate::handler::{from_fn, BoxHandler, Handler, HandlerResult, Middleware};

/// Log one line per request with method, path, status, bytes and latency.
///
/// The line is written even when a downstream handler panics; the panic then
/// continues to the engine's recovery. An aborted request is logged as
/// `request aborted` without a status, since no response is sent.
pub fn request_logger() -> Middleware {
    from_fn(|next| Arc::new(RequestLogger { next }))
}

struct RequestLogger {
    next: BoxHandler,
}

impl Handler for RequestLogger {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = AssertUnwindSafe(self.next.call(c)).catch_unwind().await;

            // Errors are turned into responses after the chain returns, so
            // report the status the error handler is going to use unless the
            // response is already on its way.
            let status = match &outcome {
                Err(payload) if payload.is::<Abort>() => None,
                _ if c.response().committed() => Some(c.response().status()),
                Ok(Ok(())) => Some(c.response().status()),
                Ok(Err(err)) => Some(
                    HttpError::find(&**err)
                        .map_or(StatusCode::INTERNAL_SERVER_ERROR, HttpError::status),
                ),
                Err(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            };

            c.logger().in_scope(|| match status {
                Some(status) => tracing::info!(
                    method = %c.method(),
                    path = c.path(),
                    status = status.as_u16(),
                    bytes = c.response().written(),
                    elapsed = ?start.elapsed(),
                    "request"
                ),
                None => tracing::info!(
                    method = %c.method(),
                    path = c.path(),
                    bytes = c.response().written(),
                    elapsed = ?start.elapsed(),
                    "request aborted"
                ),
            });

            match outcome {
                Ok(result) => result,
                Err(payload) => panic::resume_unwind(payload),
            }
        })
    }
}
