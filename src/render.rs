//! Pluggable view rendering.
//!
//! Waypost ships no template engine. Applications plug one in through
//! [`Renderer`] and call [`Context::view`](crate::Context::view).

use std::io::Write;

use crate::error::BoxError;

/// Renders a named template with JSON-shaped data.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, out: &mut dyn Write, name: &str, data: &serde_json::Value) -> Result<(), BoxError>;
}

/// Failures of the view helper itself.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("no renderer configured")]
    NoRenderer,
}
