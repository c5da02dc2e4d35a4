//! Waypost: a request lifecycle layer on top of the axum mux.
//!
//! Waypost hands every request a pooled [`Context`], runs it through a chain
//! of middleware materialized at registration time, recovers panics, and turns
//! any error into a response through a single replaceable error handler.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod render;
pub mod routing;

pub use config::WaypostConfig;
pub use context::{Context, ContextKey};
pub use engine::{abort, Abort, Engine};
pub use error::{default_error_handler, BoxError, ErrorHandler, HttpError};
pub use handler::{from_fn, handler_fn, BoxHandler, Handler, HandlerResult, Middleware};
pub use http::{HttpServer, Response, X_REQUEST_ID};
pub use lifecycle::Shutdown;
pub use render::Renderer;
pub use routing::RouteGroup;
