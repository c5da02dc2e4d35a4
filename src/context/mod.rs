//! Per-request context.
//!
//! # Responsibilities
//! - Own the request and the response wrapper for one in-flight request
//! - Carry the request-scoped logger (a `tracing::Span`)
//! - Store request-scoped values in the request's extensions
//! - Offer body binding and response writing helpers
//!
//! # Design Decisions
//! - Contexts are pooled by the engine; `reset` erases everything a previous
//!   request left behind, including the scoped logger
//! - Handlers only ever see `&mut Context`, so a context cannot be kept past
//!   the handler chain or shared between requests
//! - Values live in the request, not in the pooled struct, so they can never
//!   leak into the next request served by the same context

pub(crate) mod redirect;
pub mod values;

use std::cell::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Span;

use crate::engine::Settings;
use crate::error::HttpError;
use crate::handler::HandlerResult;
use crate::http::{BufferedSink, Response, X_REQUEST_ID};
use crate::render::ViewError;

pub use values::{ContextKey, Values};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Path parameters captured by the mux for the matched route.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub Vec<(String, String)>);

struct RequestIdKey;

impl ContextKey for RequestIdKey {
    type Value = String;
}

/// Why a request body could not be bound.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown field `{0}`")]
    UnknownField(String),
}

/// State for one request.
///
/// A `Context` is recycled between requests. It must not be stored or moved
/// out of the handler that received it; extract the values you need instead.
pub struct Context {
    request: Request<Body>,
    response: Response,
    logger: Span,
    settings: Arc<Settings>,
    query: OnceCell<HashMap<String, Vec<String>>>,
}

impl Context {
    pub(crate) fn new(settings: Arc<Settings>) -> Self {
        Self {
            request: Request::default(),
            response: Response::default(),
            logger: settings.logger.clone(),
            settings,
            query: OnceCell::new(),
        }
    }

    /// Bind the context to a new request.
    pub(crate) fn reset(&mut self, settings: Arc<Settings>, request: Request<Body>, sink: BufferedSink) {
        self.request = request;
        self.response.reset(sink);
        self.query = OnceCell::new();
        self.logger = settings.logger.clone();
        self.settings = settings;
    }

    /// Drop everything tied to the finished request.
    pub(crate) fn clear(&mut self) {
        self.request = Request::default();
        self.response.reset(BufferedSink::default());
        self.query = OnceCell::new();
        self.logger = Span::none();
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Body> {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// The request-scoped logger.
    pub fn logger(&self) -> &Span {
        &self.logger
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// First value of a request header, if present and valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Store a request-scoped value under `K`.
    pub fn put<K: ContextKey>(&mut self, value: K::Value) {
        let values = self.values().with::<K>(value);
        self.request.extensions_mut().insert(values);
    }

    /// Fetch a request-scoped value stored under `K`.
    pub fn get<K: ContextKey>(&self) -> Option<&K::Value> {
        self.request.extensions().get::<Values>()?.get::<K>()
    }

    fn values(&self) -> Values {
        self.request
            .extensions()
            .get::<Values>()
            .cloned()
            .unwrap_or_default()
    }

    /// Value of a path parameter, or `""` when the route has no such name.
    pub fn path_value(&self, name: &str) -> &str {
        self.request
            .extensions()
            .get::<PathParams>()
            .and_then(|params| params.0.iter().find(|(key, _)| key == name))
            .map_or("", |(_, value)| value.as_str())
    }

    fn query(&self) -> &HashMap<String, Vec<String>> {
        self.query.get_or_init(|| {
            let mut parsed: HashMap<String, Vec<String>> = HashMap::new();
            if let Some(raw) = self.request.uri().query() {
                for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                    parsed
                        .entry(key.into_owned())
                        .or_default()
                        .push(value.into_owned());
                }
            }
            parsed
        })
    }

    /// First value of a query parameter.
    ///
    /// Returns `""` for a present but empty parameter (`?name=`) and
    /// `default` only when the key is missing entirely.
    pub fn query_param<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.query().get(name) {
            Some(values) => values.first().map_or("", String::as_str),
            None => default,
        }
    }

    /// All values of a query parameter, in order of appearance.
    pub fn query_values(&self, name: &str) -> &[String] {
        self.query().get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the query string mentions `name` at all.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query().contains_key(name)
    }

    /// Decode the JSON body into `T`.
    ///
    /// Unknown fields, trailing data, type mismatches, malformed syntax and
    /// empty bodies are all rejected with `400 Bad Request`.
    pub async fn bind_json<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let body = std::mem::take(self.request.body_mut());
        let bytes = axum::body::to_bytes(body, self.settings.max_body_bytes)
            .await
            .map_err(|e| HttpError::bad_request().with_internal(BindError::Body(e)))?;
        decode_strict(&bytes).map_err(|e| HttpError::bad_request().with_internal(e))
    }

    /// Serialize `value` as a `200 OK` JSON response.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value)?;
        self.set_content_type(JSON_CONTENT_TYPE);
        self.response.write_header(StatusCode::OK);
        self.response.write(&body)?;
        Ok(())
    }

    /// Write an HTML body.
    pub fn html(&mut self, markup: &str) -> HandlerResult {
        self.set_content_type(HTML_CONTENT_TYPE);
        self.raw(markup.as_bytes())
    }

    /// Write raw bytes without touching the content type.
    pub fn raw(&mut self, data: &[u8]) -> HandlerResult {
        self.response.write(data)?;
        Ok(())
    }

    /// Write a plain-text body with the given status.
    pub fn string(&mut self, status: StatusCode, text: &str) -> HandlerResult {
        self.set_content_type(TEXT_CONTENT_TYPE);
        self.response.write_header(status);
        self.response.write(text.as_bytes())?;
        Ok(())
    }

    /// Send only a status.
    pub fn no_content(&mut self, status: StatusCode) -> HandlerResult {
        self.response.write_header(status);
        Ok(())
    }

    /// Redirect to `location`, resolving relative targets against the
    /// current request path.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> HandlerResult {
        let target = redirect::resolve_location(self.path(), location);
        let had_content_type = self.response.headers().contains_key(CONTENT_TYPE);
        let method = self.request.method().clone();

        self.response
            .headers_mut()
            .insert(LOCATION, HeaderValue::from_str(&target)?);
        if !had_content_type && (method == Method::GET || method == Method::HEAD) {
            self.set_content_type(HTML_CONTENT_TYPE);
        }
        self.response.write_header(status);

        if !had_content_type && method == Method::GET {
            let body = format!(
                "<a href=\"{}\">{}</a>.\n\n",
                redirect::escape_html(&target),
                status.canonical_reason().unwrap_or("")
            );
            self.response.write(body.as_bytes())?;
        }
        Ok(())
    }

    /// Render a named view through the engine's renderer and send it as HTML.
    pub fn view<T: Serialize + ?Sized>(&mut self, name: &str, data: &T) -> HandlerResult {
        let renderer = self
            .settings
            .renderer
            .clone()
            .ok_or_else(|| HttpError::internal_server_error().with_internal(ViewError::NoRenderer))?;
        let data = serde_json::to_value(data)?;
        let mut buf = Vec::new();
        renderer.render(&mut buf, name, &data)?;
        self.set_content_type(HTML_CONTENT_TYPE);
        self.raw(&buf)
    }

    /// Associate an identifier with this request.
    ///
    /// The id is mirrored into the `X-Request-ID` response header and a child
    /// span carrying it becomes the logger for the rest of the request. Empty
    /// ids are ignored.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if id.is_empty() {
            return;
        }
        match HeaderValue::from_str(&id) {
            Ok(value) => {
                self.response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Err(_) => {
                tracing::debug!(id = %id, "Request id is not a valid header value");
            }
        }
        self.logger = tracing::info_span!(parent: &self.logger, "request", id = %id);
        self.put::<RequestIdKey>(id);
    }

    /// The request identifier, or `""` when none was set.
    pub fn request_id(&self) -> &str {
        self.get::<RequestIdKey>().map_or("", String::as_str)
    }

    fn set_content_type(&mut self, value: &'static str) {
        self.response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

fn decode_strict<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BindError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let mut unknown = None;
    let value = serde_ignored::deserialize(&mut deserializer, |path| {
        if unknown.is_none() {
            unknown = Some(path.to_string());
        }
    })?;
    deserializer.end()?;
    if let Some(field) = unknown {
        return Err(BindError::UnknownField(field));
    }
    Ok(value)
}
