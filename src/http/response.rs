//! Response handling.
//!
//! # Responsibilities
//! - Collect what a loaded handler writes (status, headers, body)
//! - Turn the collected output into an Axum response
//!
//! # Design Decisions
//! - The first status written wins; later ones are ignored
//! - The first body write commits status 200 if none was written
//! - Headers set after the status is committed are ignored
//! - Out-of-range status codes become 500 rather than panicking inside a callback

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Buffered output of one handler invocation.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the status code.
    pub fn write_header(&mut self, status: u16) {
        if let Some(current) = self.status {
            tracing::debug!(current = %current, ignored = status, "Superfluous write_header call");
            return;
        }
        let status = StatusCode::from_u16(status).unwrap_or_else(|_| {
            tracing::warn!(status, "Handler wrote an invalid status code");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        self.status = Some(status);
    }

    /// Append a header. Invalid names or values are dropped.
    pub fn set_header(&mut self, name: &[u8], value: &[u8]) {
        if self.status.is_some() {
            tracing::debug!("Header set after status was committed, ignoring");
            return;
        }
        match (HeaderName::from_bytes(name), HeaderValue::from_bytes(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!("Handler set an invalid header, ignoring"),
        }
    }

    /// Append body bytes, returning how many were accepted.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl IntoResponse for ResponseBuffer {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_buffer_is_empty_ok() {
        let buffer = ResponseBuffer::new();
        assert_eq!(buffer.status(), StatusCode::OK);
        assert!(buffer.body().is_empty());
    }

    #[test]
    fn test_first_status_wins() {
        let mut buffer = ResponseBuffer::new();
        buffer.write_header(404);
        buffer.write_header(200);
        assert_eq!(buffer.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_write_commits_ok_and_freezes_headers() {
        let mut buffer = ResponseBuffer::new();
        buffer.set_header(b"content-type", b"text/plain");
        assert_eq!(buffer.write(b"hi"), 2);
        buffer.write_header(500);
        buffer.set_header(b"x-late", b"1");

        assert_eq!(buffer.status(), StatusCode::OK);
        assert_eq!(buffer.headers()["content-type"], "text/plain");
        assert!(buffer.headers().get("x-late").is_none());
        assert_eq!(buffer.body(), b"hi");
    }

    #[test]
    fn test_invalid_status_and_header() {
        let mut buffer = ResponseBuffer::new();
        buffer.set_header(b"bad header", b"v");
        buffer.write_header(42);
        assert_eq!(buffer.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(buffer.headers().is_empty());
    }

    #[tokio::test]
    async fn test_into_response() {
        let mut buffer = ResponseBuffer::new();
        buffer.write_header(201);
        buffer.write(b"created");

        let response = buffer.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"created");
    }
}
