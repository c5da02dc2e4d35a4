//! Route registration.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     Engine (root group)
//!         → group(prefix, middleware)  (prefix concatenated, middleware copied)
//!         → handle(method, path, h)    (pattern built, chain materialized)
//!         → axum::Router::route        (the mux owns matching from here on)
//!
//! Request:
//!     axum::Router match → adapter → Engine::execute(chain)
//! ```
//!
//! # Design Decisions
//! - Matching, 404 and 405 (with `Allow`) belong to axum; nothing here
//!   inspects paths at request time
//! - Middleware is copied into a child group when it is created and the chain
//!   is composed once per registration, so later `use_middleware` calls on an
//!   ancestor never change routes that already exist
//! - A static pattern ending in `/` serves its whole subtree and gets a
//!   `301` from the slash-less path; both are resolved in the mux fallback,
//!   after every explicit route had its chance

pub mod group;
pub(crate) mod subtree;

pub use group::RouteGroup;
