//! Response tracking and buffering.
//!
//! # Responsibilities
//! - Record the status a handler chose (first call wins) and the bytes it wrote
//! - Buffer the response head and body until the handler chain returns
//! - Hand the finished response back to the mux
//!
//! # Design Decisions
//! - `Response` observes, `ResponseSink` enforces: the wrapper always forwards
//!   `write_header` and leaves single-status semantics to the sink
//! - The wrapper is reset in place so pooled contexts keep their allocation

use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use bytes::BytesMut;

/// The raw response target a [`Response`] decorates.
pub trait ResponseSink: Send {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Write body bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

/// In-memory sink used by the engine.
///
/// Mirrors transport behavior: the first status sent is the one the client
/// sees, and writing a body implies `200 OK` when no status was sent.
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status committed so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert the buffered head and body into a response for the mux.
    pub fn into_response(self) -> axum::http::Response<Body> {
        let mut response = axum::http::Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(committed) = self.status {
            tracing::debug!(
                committed = committed.as_u16(),
                attempted = status.as_u16(),
                "Superfluous write_header call"
            );
            return;
        }
        self.status = Some(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Status and byte accounting around a [`ResponseSink`].
#[derive(Debug, Default)]
pub struct Response<S = BufferedSink> {
    sink: S,
    status: Option<StatusCode>,
    written: usize,
}

impl<S: ResponseSink> Response<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            status: None,
            written: 0,
        }
    }

    /// Rebind to a new sink and forget everything recorded so far.
    pub fn reset(&mut self, sink: S) {
        self.sink = sink;
        self.status = None;
        self.written = 0;
    }

    pub fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    /// Record `status` unless one is already recorded, then forward it.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.sink.write_header(status);
    }

    /// Forward body bytes, recording an implicit `200 OK` first if needed.
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        let result = self.sink.write(data);
        if let Ok(n) = result {
            self.written += n;
        }
        result
    }

    /// Recorded status, or `200 OK` when nothing was recorded yet.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status has been recorded.
    pub fn committed(&self) -> bool {
        self.status.is_some()
    }

    /// Total body bytes accepted by the sink.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl Response<BufferedSink> {
    /// Take the buffered response out, leaving an empty sink behind.
    pub fn finish(&mut self) -> axum::http::Response<Body> {
        std::mem::take(&mut self.sink).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per write.
    #[derive(Default)]
    struct ShortSink {
        headers: HeaderMap,
        statuses: Vec<StatusCode>,
        limit: usize,
        fail: bool,
    }

    impl ResponseSink for ShortSink {
        fn headers(&self) -> &HeaderMap {
            &self.headers
        }

        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_header(&mut self, status: StatusCode) {
            self.statuses.push(status);
        }

        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
            }
            Ok(data.len().min(self.limit))
        }
    }

    #[test]
    fn test_status_defaults_to_ok() {
        let response = Response::new(BufferedSink::new());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.written(), 0);
        assert!(!response.committed());
    }

    #[test]
    fn test_first_status_wins_but_calls_are_forwarded() {
        let mut response = Response::new(ShortSink::default());
        response.write_header(StatusCode::CREATED);
        response.write_header(StatusCode::NOT_FOUND);

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.sink().statuses,
            vec![StatusCode::CREATED, StatusCode::NOT_FOUND]
        );
    }

    #[test]
    fn test_write_records_implicit_ok() {
        let mut response = Response::new(BufferedSink::new());
        let n = response.write(b"hello").unwrap();

        assert_eq!(n, 5);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.written(), 5);
        assert_eq!(response.sink().status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_written_counts_forwarded_bytes() {
        let mut response = Response::new(ShortSink {
            limit: 3,
            ..Default::default()
        });
        assert_eq!(response.write(b"abcdef").unwrap(), 3);
        assert_eq!(response.write(b"gh").unwrap(), 2);
        assert_eq!(response.written(), 5);
    }

    #[test]
    fn test_sink_errors_pass_through() {
        let mut response = Response::new(ShortSink {
            fail: true,
            ..Default::default()
        });
        let err = response.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(response.written(), 0);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_buffered_sink_keeps_first_status() {
        let mut sink = BufferedSink::new();
        sink.write_header(StatusCode::ACCEPTED);
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        sink.write(b"ok").unwrap();

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_reset_clears_accounting() {
        let mut response = Response::new(BufferedSink::new());
        response.write_header(StatusCode::IM_A_TEAPOT);
        response.write(b"tea").unwrap();

        response.reset(BufferedSink::new());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.written(), 0);
        assert!(response.sink().body().is_empty());
    }
}
