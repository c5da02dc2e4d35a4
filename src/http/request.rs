//! Request identification.
//!
//! # Design Decisions
//! - An incoming `X-Request-ID` header is trusted and reused as-is
//! - Generated ids are 8 random bytes rendered as 16 lowercase hex digits

use axum::http::HeaderName;

/// Header carrying the request identifier in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generate a fresh request identifier.
pub fn generate_request_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_request_id());
    }
}
