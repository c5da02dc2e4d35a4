//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ctrl+C / caller → Shutdown::trigger
//!     → every subscribed server stops accepting
//!     → in-flight requests drain (bounded by shutdown_timeout_secs)
//!     → HttpServer::run returns
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; servers subscribe, whoever owns the signal triggers
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;

pub use shutdown::Shutdown;
