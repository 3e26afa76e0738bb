//! Pipeline error taxonomy.
//!
//! Every stage returns its own error; the coordinator propagates them
//! unchanged. At the HTTP boundary any of them becomes a 500 whose body is the
//! error's full text.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::pipeline::abi::HANDLER_SHAPE;

/// Failures while turning source text into an artifact.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Workspace or file I/O failed, or the compiler could not be started.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler exited unsuccessfully. The message is its combined output, verbatim.
    #[error("{output}")]
    Compile { output: String },

    /// The compiler did not finish before the deadline and was killed.
    #[error("build timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    /// The build was abandoned because the server is shutting down.
    #[error("build cancelled: server is shutting down")]
    Cancelled,
}

impl BuildError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| BuildError::Io { context, source }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::Io { .. } => "io",
            BuildError::Compile { .. } => "compile",
            BuildError::Timeout { .. } => "timeout",
            BuildError::Cancelled => "cancelled",
        }
    }
}

/// Failures while opening an artifact and checking its export.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("opening {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol {symbol} not found in {}: {detail}", .path.display())]
    SymbolNotFound {
        symbol: &'static str,
        path: PathBuf,
        detail: String,
    },

    #[error("{symbol} has shape {observed}, expected {}", HANDLER_SHAPE)]
    TypeMismatch {
        symbol: &'static str,
        observed: String,
    },
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Open { .. } => "open",
            LoadError::SymbolNotFound { .. } => "symbol_not_found",
            LoadError::TypeMismatch { .. } => "type_mismatch",
        }
    }
}

/// Failure to commit a loaded handler into the live tables.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("route {0} is already registered")]
    Duplicate(String),
}

/// Any failure of a submission.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    /// The blocking worker running the loader died.
    #[error("loader task failed: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_is_verbatim() {
        let output = "error[E0425]: cannot find value `x` in this scope\n --> main.rs:1:1\n";
        let err = PipelineError::from(BuildError::Compile { output: output.to_string() });
        assert_eq!(err.to_string(), output);
    }

    #[test]
    fn test_type_mismatch_names_both_shapes() {
        let err = LoadError::TypeMismatch { symbol: "H", observed: "fn()".to_string() };
        let text = err.to_string();
        assert!(text.starts_with("H has shape fn(), expected "));
        assert!(text.ends_with(HANDLER_SHAPE));
    }

    #[test]
    fn test_timeout_is_distinct_from_compile() {
        let err = BuildError::Timeout { after: Duration::from_secs(3) };
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.to_string(), "build timed out after 3s");
    }

    #[tokio::test]
    async fn test_into_response_is_500_with_full_text() {
        let err = PipelineError::from(LoadError::SymbolNotFound {
            symbol: "H",
            path: PathBuf::from("/tmp/w/libhandler.so"),
            detail: "undefined symbol: H".to_string(),
        });
        let expected = err.to_string();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), expected);
        assert!(expected.contains("symbol H not found"));
    }
}
