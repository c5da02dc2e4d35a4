//! Built-in middleware.
//!
//! # Ordering
//! Middleware runs in registration order. Register [`request_id`] before
//! [`request_logger`] so log lines carry the id:
//!
//! ```no_run
//! use waypost::{middleware, Engine};
//!
//! let mut engine = Engine::new();
//! engine.use_middleware([middleware::request_id(), middleware::request_logger()]);
//! ```

pub mod basic_auth;
pub mod logger;
pub mod request_id;

pub use basic_auth::{basic_auth, BasicAuthConfig};
pub use logger::request_logger;
pub use request_id::request_id;
