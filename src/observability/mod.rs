//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine / middleware produce:
//!     → per-request span (request id as a field)
//!     → logging.rs (subscriber formats and filters events)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for log aggregation)
//! ```
//!
//! # Design Decisions
//! - The request id lives on a span, so every event inside it carries the id
//! - `RUST_LOG` wins over the configured filter

pub mod logging;

pub use logging::init_logging;
