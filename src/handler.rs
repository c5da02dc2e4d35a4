//! Handlers and middleware.
//!
//! A handler consumes `&mut Context` and reports success or an error. A
//! middleware turns a downstream handler into an upstream one. Chains are
//! built once, when a route is registered:
//!
//! ```text
//! [m1, m2, m3] + h   →   m1(m2(m3(h)))
//! request  → m1 → m2 → m3 → h
//! response ← m1 ← m2 ← m3 ← h
//! ```

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::error::BoxError;

/// Outcome of a handler.
pub type HandlerResult = Result<(), BoxError>;

/// A unit of request handling logic.
///
/// Closures of the shape `|c| Box::pin(async move { .. })` implement this
/// trait; middleware usually implements it on a struct holding `next`.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        self(c)
    }
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Transform from a downstream handler to an upstream handler.
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Box a closure handler.
///
/// Going through this function lets the compiler infer the closure's
/// higher-ranked signature.
pub fn handler_fn<F>(f: F) -> BoxHandler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a middleware from a wrapping function.
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` so that `middleware[0]` runs first.
pub(crate) fn compose(middleware: &[Middleware], handler: BoxHandler) -> BoxHandler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, wrap| wrap(next))
}
