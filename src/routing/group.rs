//! Route groups.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::RawPathParams;
use axum::http::{Method, Request};
use axum::routing::{any, on, MethodFilter};
use futures_util::future::BoxFuture;

use crate::context::{Context, PathParams};
use crate::engine::Inner;
use crate::handler::{compose, BoxHandler, HandlerResult, Middleware};

/// A path prefix plus the middleware every route under it runs through.
///
/// The middleware list holds the parent's middleware followed by the
/// group's own, in registration order.
#[derive(Clone)]
pub struct RouteGroup {
    inner: Arc<Inner>,
    prefix: String,
    parent_prefix: Option<String>,
    middleware: Vec<Middleware>,
}

impl RouteGroup {
    pub(crate) fn root(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            prefix: String::new(),
            parent_prefix: None,
            middleware: Vec::new(),
        }
    }

    /// Accumulated path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix of the group this one was created from; `None` for the root.
    pub fn parent_prefix(&self) -> Option<&str> {
        self.parent_prefix.as_deref()
    }

    /// Number of middleware a route registered now would run through.
    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }

    /// Create a child group under `prefix` with extra middleware.
    pub fn group(&self, prefix: &str, middleware: impl IntoIterator<Item = Middleware>) -> RouteGroup {
        let mut inherited = self.middleware.clone();
        inherited.extend(middleware);
        RouteGroup {
            inner: self.inner.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
            parent_prefix: Some(self.prefix.clone()),
            middleware: inherited,
        }
    }

    /// Append middleware for routes registered from now on.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Middleware>) {
        self.middleware.extend(middleware);
    }

    /// Register a closure handler. `None` matches any method.
    pub fn handle<F>(&self, method: Option<Method>, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle_boxed(method, path, Arc::new(handler));
    }

    /// Register a prebuilt handler under the group prefix.
    pub fn handle_boxed(&self, method: Option<Method>, path: &str, handler: BoxHandler) {
        let pattern = match method {
            Some(method) => format!("{} {}{}", method, self.prefix, path),
            None => format!("{}{}", self.prefix, path),
        };
        self.handle_raw(&pattern, handler);
    }

    /// Register `handler` under a raw `"[METHOD ]/path"` pattern.
    ///
    /// The group prefix is not applied; the group middleware is.
    ///
    /// # Panics
    ///
    /// Panics on an unknown method, or when the mux rejects the path (for
    /// example a duplicate method on the same path).
    pub fn handle_raw(&self, pattern: &str, handler: BoxHandler) {
        let (method, path) = parse_pattern(pattern);
        let chain = compose(&self.middleware, handler);
        let inner = self.inner.clone();

        let endpoint = move |params: Result<RawPathParams, RawPathParamsRejection>,
                             mut request: Request<Body>| {
            let inner = inner.clone();
            let chain = chain.clone();
            async move {
                if let Ok(params) = params {
                    let params = params
                        .iter()
                        .map(|(name, value)| (name.to_owned(), value.to_owned()))
                        .collect();
                    request.extensions_mut().insert(PathParams(params));
                }
                inner.execute(&*chain, request).await
            }
        };

        let route = match &method {
            Some(method) => on(method_filter(method), endpoint),
            None => any(endpoint),
        };

        tracing::debug!(
            pattern = %pattern,
            middleware = self.middleware.len(),
            "Route registered"
        );
        self.inner.register(path, route);
    }

    pub fn get<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Some(Method::GET), path, handler);
    }

    pub fn post<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Some(Method::POST), path, handler);
    }

    pub fn put<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Some(Method::PUT), path, handler);
    }

    pub fn delete<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Some(Method::DELETE), path, handler);
    }

    pub fn any<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(None, path, handler);
    }
}

/// Split `"GET /path"` into method and path; a bare path matches any method.
fn parse_pattern(pattern: &str) -> (Option<Method>, &str) {
    match pattern.split_once(' ') {
        Some((method, path)) if !method.is_empty() && !method.starts_with('/') => {
            let method = Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|_| panic!("invalid method in route pattern `{}`", pattern));
            (Some(method), path.trim_start())
        }
        _ => (None, pattern),
    }
}

/// GET routes answer HEAD as well.
fn method_filter(method: &Method) -> MethodFilter {
    let filter = MethodFilter::try_from(method.clone())
        .unwrap_or_else(|_| panic!("method `{}` cannot be routed", method));
    if *method == Method::GET {
        filter.or(MethodFilter::HEAD)
    } else {
        filter
    }
}
