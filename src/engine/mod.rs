//! Request lifecycle engine.
//!
//! # Data Flow
//! ```text
//! mux match
//!     → Engine::execute
//!         → pool.rs (acquire + reset a Context; guard releases on drop)
//!         → handler chain under catch_unwind
//!             Ok(())           → done
//!             Err(e)           → error handler
//!             panic(Abort)     → resume_unwind (connection dropped)
//!             panic(other)     → recover.rs (500 + trace) → error handler
//!         → buffered response handed to the mux
//!     → context back in the pool
//! ```
//!
//! # Design Decisions
//! - The pool belongs to the engine instance, never to the process
//! - Settings (error handler, renderer, base logger) are swapped atomically
//!   and read lock-free per request
//! - The error handler runs under its own unwind guard
//! - Panics recovered here are reported through the error handler only; the
//!   previous panic hook stays quiet for them

mod pool;
mod recover;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use futures_util::FutureExt;
use tracing::Span;

use crate::config::{EngineConfig, ServerConfig};
use crate::context::Context;
use crate::error::{default_error_handler, BoxError, ErrorHandler};
use crate::handler::{BoxHandler, Handler, HandlerResult, Middleware};
use crate::http::{BufferedSink, HttpServer};
use crate::render::Renderer;
use crate::routing::subtree::Subtrees;
use crate::routing::RouteGroup;

pub use recover::{abort, Abort, Panicked};

use pool::ContextPool;

/// Configuration shared by every request, read through the context.
#[derive(Clone)]
pub(crate) struct Settings {
    pub(crate) error_handler: ErrorHandler,
    pub(crate) renderer: Option<Arc<dyn Renderer>>,
    pub(crate) logger: Span,
    pub(crate) max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            error_handler: Arc::new(default_error_handler),
            renderer: None,
            logger: Span::none(),
            max_body_bytes: EngineConfig::default().max_body_bytes,
        }
    }
}

/// State shared between the engine, its route groups and registered routes.
pub(crate) struct Inner {
    settings: ArcSwap<Settings>,
    pool: ContextPool,
    mux: Mutex<Mux>,
}

/// Registered routes plus the slash-terminated roots served from the
/// fallback.
#[derive(Default)]
struct Mux {
    router: Router,
    subtrees: Subtrees,
}

impl Inner {
    fn update(&self, f: impl Fn(&mut Settings)) {
        self.settings.rcu(|current| {
            let mut next = Settings::clone(current);
            f(&mut next);
            next
        });
    }

    /// Add a route to the mux.
    pub(crate) fn register(&self, path: &str, route: axum::routing::MethodRouter) {
        let mut mux = self.mux.lock().unwrap_or_else(PoisonError::into_inner);
        if Subtrees::owns_subtree(path) {
            mux.subtrees.insert(path, route.clone());
        }
        let current = std::mem::take(&mut mux.router);
        mux.router = current.route(path, route);
    }

    /// Run `handler` for one request.
    pub(crate) async fn execute(
        &self,
        handler: &dyn Handler,
        request: Request<Body>,
    ) -> axum::http::Response<Body> {
        let settings = self.settings.load_full();
        let mut context = self.pool.acquire(&settings);
        context.reset(settings.clone(), request, BufferedSink::new());

        let mut call = handler.call(&mut context);
        let outcome = AssertUnwindSafe(std::future::poll_fn(|cx| {
            let _scope = recover::scope();
            call.as_mut().poll(cx)
        }))
        .catch_unwind()
        .await;
        drop(call);

        let failure: Option<BoxError> = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => {
                if payload.is::<Abort>() {
                    std::panic::resume_unwind(payload);
                }
                Some(Box::new(recover::into_http_error(payload)))
            }
        };

        if let Some(err) = failure {
            if !handle_error(&settings.error_handler, err, &mut context) {
                let mut response = axum::http::Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return response;
            }
        }

        context.response_mut().finish()
    }
}

/// Run the error handler; `false` when it panicked.
fn handle_error(error_handler: &ErrorHandler, err: BoxError, context: &mut Context) -> bool {
    let outcome = {
        let _scope = recover::scope();
        std::panic::catch_unwind(AssertUnwindSafe(|| error_handler(err, context)))
    };
    match outcome {
        Ok(()) => true,
        Err(payload) => {
            if payload.is::<Abort>() {
                std::panic::resume_unwind(payload);
            }
            tracing::error!(
                id = context.request_id(),
                error = %recover::panic_message(payload.as_ref()),
                "error handler panicked"
            );
            false
        }
    }
}

/// The framework instance: owns the mux, the context pool, the shared
/// settings and the root route group.
pub struct Engine {
    inner: Arc<Inner>,
    root: RouteGroup,
}

impl Engine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        recover::install_panic_hook();

        let settings = Settings {
            max_body_bytes: config.max_body_bytes,
            ..Settings::default()
        };
        let inner = Arc::new(Inner {
            settings: ArcSwap::from_pointee(settings),
            pool: ContextPool::new(config.pool_capacity),
            mux: Mutex::new(Mux::default()),
        });
        let root = RouteGroup::root(inner.clone());
        Self { inner, root }
    }

    /// Replace the error handler for all subsequent requests.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(BoxError, &mut Context) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        self.inner
            .update(|settings| settings.error_handler = handler.clone());
    }

    pub fn set_renderer<R: Renderer>(&self, renderer: R) {
        let renderer: Arc<dyn Renderer> = Arc::new(renderer);
        self.inner
            .update(|settings| settings.renderer = Some(renderer.clone()));
    }

    /// Set the base span every request's logger starts from.
    pub fn set_logger(&self, logger: Span) {
        self.inner.update(|settings| settings.logger = logger.clone());
    }

    pub fn logger(&self) -> Span {
        self.inner.settings.load().logger.clone()
    }

    /// Contexts currently parked in the pool.
    pub fn idle_contexts(&self) -> usize {
        self.inner.pool.idle()
    }

    /// Snapshot of the mux with every route registered so far.
    pub fn router(&self) -> Router {
        let mux = self.inner.mux.lock().unwrap_or_else(PoisonError::into_inner);
        mux.subtrees.install(mux.router.clone())
    }

    /// Run `handler` for `request` outside the mux.
    pub async fn execute(&self, handler: &dyn Handler, request: Request<Body>) -> axum::http::Response<Body> {
        self.inner.execute(handler, request).await
    }

    /// Serve every route registered so far until `shutdown` fires.
    pub async fn serve(
        &self,
        listener: tokio::net::TcpListener,
        config: ServerConfig,
        shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        HttpServer::new(self, config).run(listener, shutdown).await
    }

    /// The root route group.
    pub fn routes(&mut self) -> &mut RouteGroup {
        &mut self.root
    }

    /// Append middleware to the root group.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Middleware>) {
        self.root.use_middleware(middleware);
    }

    pub fn group(&self, prefix: &str, middleware: impl IntoIterator<Item = Middleware>) -> RouteGroup {
        self.root.group(prefix, middleware)
    }

    pub fn handle<F>(&self, method: Option<Method>, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.handle(method, path, handler);
    }

    pub fn handle_boxed(&self, method: Option<Method>, path: &str, handler: BoxHandler) {
        self.root.handle_boxed(method, path, handler);
    }

    pub fn handle_raw(&self, pattern: &str, handler: BoxHandler) {
        self.root.handle_raw(pattern, handler);
    }

    pub fn get<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.get(path, handler);
    }

    pub fn post<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.post(path, handler);
    }

    pub fn put<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.put(path, handler);
    }

    pub fn delete<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.delete(path, handler);
    }

    pub fn any<F>(&self, path: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context) -> futures_util::future::BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.root.any(path, handler);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
