//! Default translation of errors into responses.

use std::sync::Arc;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderValue, StatusCode};
use serde::Serialize;

use super::{BoxError, HttpError};
use crate::context::Context;

/// Replaceable hook that turns an error into a response.
pub type ErrorHandler = Arc<dyn Fn(BoxError, &mut Context) + Send + Sync>;

/// Client-visible error payload.
#[derive(Serialize)]
struct ErrorPayload<'a> {
    code: u16,
    message: &'a str,
}

/// Log the error and write a response for it.
///
/// Nothing is written when the handler already sent body bytes. `204` and
/// `304` get a bare status. Clients accepting `application/json` get
/// `{"code": .., "message": ..}`, everyone else the plain-text message.
pub fn default_error_handler(err: BoxError, c: &mut Context) {
    let err = HttpError::coerce(err);
    let cause = err.internal().map(ToString::to_string);

    c.logger().in_scope(|| match err.stack() {
        Some(stack) => tracing::error!(
            id = c.request_id(),
            error = cause.as_deref().unwrap_or_default(),
            stack = %stack,
            "panic recovered"
        ),
        None => tracing::error!(
            id = c.request_id(),
            code = err.status().as_u16(),
            error = cause.as_deref().unwrap_or_default(),
            "request error"
        ),
    });

    if c.response().written() > 0 {
        return;
    }

    let status = err.status();
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        c.response_mut().write_header(status);
        return;
    }

    let wants_json = c
        .header("accept")
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        let payload = ErrorPayload {
            code: status.as_u16(),
            message: err.message(),
        };
        let mut body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error payload");
                Vec::new()
            }
        };
        body.push(b'\n');

        let response = c.response_mut();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response.write_header(status);
        let _ = response.write(&body);
        return;
    }

    let response = c.response_mut();
    let headers = response.headers_mut();
    headers.remove(CONTENT_LENGTH);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response.write_header(status);
    let _ = response.write(format!("{}\n", err.message()).as_bytes());
}
