//! HTTP plumbing between the mux and the request lifecycle.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, timeout layer, graceful shutdown)
//!     → axum::Router (pattern match, 404/405)
//!     → Engine::execute (pooled Context)
//!     → response.rs (status/bytes tracking over a buffered sink)
//!     → http::Response handed back to the mux
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{generate_request_id, X_REQUEST_ID};
pub use response::{BufferedSink, Response, ResponseSink};
pub use server::HttpServer;
