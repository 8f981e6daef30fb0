//! Error types for the Lotus RPC client.
//!
//! Every failure surfaced by the client is a [`ClientError`] tagged with an
//! [`ErrorKind`]. The kind is decided once, where the failure is first
//! observed (HTTP status, RPC error code, transport failure, local
//! precondition, or call-context expiry), and never re-derived afterwards.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed cause carried by a [`ClientError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Classification of a client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Unknown,
    /// Node unreachable, connection dropped, or the node reported a 5xx.
    Connection,
    Authentication,
    InvalidParams,
    NotFound,
    /// Request or caller deadline expired.
    RpcTimeout,
    MethodNotFound,
    InvalidRequest,
    /// The node answered, but not with the shape we expected.
    MalformedResponse,
    /// The caller cancelled the call context.
    Canceled,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed if simply tried again.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::RpcTimeout)
    }
}

/// An error returned by the Lotus client.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
    /// JSON-RPC error code, when the failure came from an RPC error object.
    code: Option<i64>,
    #[source]
    source: Option<BoxError>,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_auth_error(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_connection_error(&self) -> bool {
        self.kind == ErrorKind::Connection
    }

    /// Local precondition failure: an argument was rejected before any
    /// request was sent.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "call canceled")
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::RpcTimeout, "deadline exceeded")
    }

    /// Classify a non-200 HTTP response.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::new(ErrorKind::Authentication, "unauthorized"),
            404 => Self::new(ErrorKind::NotFound, "not found"),
            500 => Self::new(ErrorKind::Connection, "internal server error"),
            501..=599 => Self::new(
                ErrorKind::Connection,
                format!("server error: status code {status}"),
            ),
            _ => Self::new(
                ErrorKind::Unknown,
                format!("unexpected status code: {status}"),
            ),
        }
    }

    /// Classify an error object returned inside a JSON-RPC envelope.
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        let kind = match code {
            -32001 | -32602 => ErrorKind::InvalidParams,
            -32002 | -32601 => ErrorKind::MethodNotFound,
            -32003 | -32600 => ErrorKind::InvalidRequest,
            // Lotus reports unknown actors with a generic code.
            _ if message.contains("actor not found") => ErrorKind::NotFound,
            _ => ErrorKind::Unknown,
        };

        Self {
            kind,
            message: message.to_string(),
            code: Some(code),
            source: None,
        }
    }

    /// Classify a failure from the HTTP layer itself (DNS, connect, read).
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorKind::RpcTimeout, "request timed out").with_source(err)
        } else if err.is_decode() {
            Self::malformed("failed to decode response body").with_source(err)
        } else {
            Self::new(ErrorKind::Connection, "failed to reach node").with_source(err)
        }
    }
}
