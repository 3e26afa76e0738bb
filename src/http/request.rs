//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every request
//! - Buffer a dispatched request into an owned form a native handler can borrow
//! - Pull the submitted program out of whatever form encoding the client used
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Dispatched bodies are read fully (bounded by the body limit) before the
//!   handler runs, because the handler is synchronous native code

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Query};
use axum::http::{header::CONTENT_TYPE, HeaderName, Request};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `x-request-id` values from random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Read the request ID set by the request-ID layer.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Owned copy of a request, ready to be lent to a loaded handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl HandlerRequest {
    /// Buffer `request`, reading at most `body_limit` bytes of body.
    pub async fn from_request(request: Request<Body>, body_limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, body_limit).await?;

        Ok(Self {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            body: body.to_vec(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionFields {
    program: Option<String>,
}

/// The `program` field of a submission.
///
/// Read from a urlencoded or multipart body, falling back to the query
/// string. A request carrying neither yields an empty program, which is left
/// for the compiler to reject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSource(pub String);

impl<S> FromRequest<S> for ProgramSource
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let from_query = Query::<SubmissionFields>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(fields)| fields.program);

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let from_body = if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            program_from_multipart(multipart).await?
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<SubmissionFields>::from_request(request, state)
                .await
                .map_err(IntoResponse::into_response)?;
            fields.program
        } else {
            None
        };

        Ok(Self(from_body.or(from_query).unwrap_or_default()))
    }
}

async fn program_from_multipart(mut multipart: Multipart) -> Result<Option<String>, Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        if field.name() == Some("program") {
            return field
                .text()
                .await
                .map(Some)
                .map_err(IntoResponse::into_response);
        }
    }
    Ok(None)
}
