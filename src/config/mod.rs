//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → WaypostConfig (validated, immutable)
//!     → EngineConfig handed to Engine::with_config
//!     → ServerConfig handed to HttpServer::new
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{EngineConfig, LogFormat, ObservabilityConfig, ServerConfig, WaypostConfig};
pub use validation::{validate_config, ValidationError};
