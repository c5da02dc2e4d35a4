//! Request id middleware.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::handler::{from_fn, BoxHandler, Handler, HandlerResult, Middleware};
use crate::http::{generate_request_id, X_REQUEST_ID};

/// Ensure every request has an id.
///
/// Reuses a non-empty incoming `X-Request-ID`, otherwise generates one.
pub fn request_id() -> Middleware {
    from_fn(|next| Arc::new(RequestId { next }))
}

struct RequestId {
    next: BoxHandler,
}

impl Handler for RequestId {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let id = c
                .header(X_REQUEST_ID.as_str())
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .unwrap_or_else(generate_request_id);
            c.set_request_id(id);
            self.next.call(c).await
        })
    }
}
