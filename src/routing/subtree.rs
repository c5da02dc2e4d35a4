//! Slash-terminated patterns.
//!
//! A static pattern ending in `/` (other than `/` itself) owns the whole
//! subtree below it: `/admin/` also serves `/admin/users` unless a more
//! specific route matches. A request for the same path without the slash is
//! redirected to it with `301 Moved Permanently`.
//!
//! Both behaviors run from the mux fallback, so they only apply when no
//! registered route matched and can never collide with an explicit route.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use tower::ServiceExt;

use crate::context::redirect::escape_html;

/// Registered subtree roots keyed by their slash-terminated path.
#[derive(Clone, Default)]
pub(crate) struct Subtrees {
    roots: BTreeMap<String, MethodRouter>,
}

impl Subtrees {
    /// Whether `path` is a pattern that owns a subtree.
    pub(crate) fn owns_subtree(path: &str) -> bool {
        path.len() > 1 && path.ends_with('/') && !path.contains('{')
    }

    /// Record `route` as serving the subtree under `path`.
    pub(crate) fn insert(&mut self, path: &str, route: MethodRouter) {
        let route = match self.roots.remove(path) {
            Some(existing) => existing.merge(route),
            None => route,
        };
        self.roots.insert(path.to_owned(), route);
    }

    /// Attach the subtree fallback to `router`.
    pub(crate) fn install(&self, router: Router) -> Router {
        if self.roots.is_empty() {
            return router;
        }
        let roots = Arc::new(self.roots.clone());
        router.fallback(move |request: Request<Body>| {
            let roots = roots.clone();
            async move { dispatch(&roots, request).await }
        })
    }
}

async fn dispatch(roots: &BTreeMap<String, MethodRouter>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_owned();

    let slashed = format!("{}/", path);
    if roots.contains_key(&slashed) {
        let location = match request.uri().query() {
            Some(query) => format!("{}?{}", slashed, query),
            None => slashed,
        };
        return moved_permanently(request.method(), &location);
    }

    // Nested roots sort after their ancestors, so the first hit from the end
    // is the longest prefix.
    let root = roots
        .iter()
        .rev()
        .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        .map(|(_, route)| route.clone());

    match root {
        Some(route) => match route.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn moved_permanently(method: &Method, location: &str) -> Response {
    let Ok(value) = HeaderValue::from_str(location) else {
        tracing::debug!(location = %location, "Redirect target is not a valid header value");
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = if *method == Method::GET {
        Body::from(format!(
            "<a href=\"{}\">Moved Permanently</a>.\n\n",
            escape_html(location)
        ))
    } else {
        Body::empty()
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(LOCATION, value);
    if *method == Method::GET || *method == Method::HEAD {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
    }
    response
}
