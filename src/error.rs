/// Boxed error produced by a [`Transport`](crate::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The client was disposed before the request started.
    #[error("client has been disposed")]
    Disposed,
    /// Non-success HTTP status code. The raw body is kept as text.
    #[error("http error {status} {status_text}")]
    HttpStatus {
        status: u16,
        status_text: String,
        body: String,
    },
    /// A single attempt exceeded its timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The client-wide cancellation scope was revoked by `abort()` or `dispose()`.
    #[error("request aborted")]
    Aborted,
    /// Network or request execution error from the transport.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// A success response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request could not be built (invalid header name or value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The transport could not be built from the client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HttpError {
    /// Returns `true` when the failure was caused by revoking the client scope.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns the HTTP status code for [`HttpError::HttpStatus`] failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HttpError;

    #[test]
    fn status_only_for_http_status() {
        let err = HttpError::HttpStatus {
            status: 503,
            status_text: "Service Unavailable".to_owned(),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "http error 503 Service Unavailable");
        assert_eq!(HttpError::Aborted.status(), None);
    }

    #[test]
    fn only_aborted_is_cancellation() {
        assert!(HttpError::Aborted.is_cancellation());
        assert!(!HttpError::Timeout { timeout_ms: 5 }.is_cancellation());
        assert!(!HttpError::Disposed.is_cancellation());
    }
}
