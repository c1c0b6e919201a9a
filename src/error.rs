use std::sync::Arc;

/// Represents a result type for operations in the Attune SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// SDK-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Attune SDK.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Request failed at the transport level (timeout, exhausted retries, or a non-retryable
    /// response).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid base_url configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// A successful response failed to parse into the expected shape. This is a contract
    /// violation on the server side and is surfaced to the caller, unlike cache reads which
    /// degrade to "absent".
    #[error("malformed server response")]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    SchemaValidation(#[source] Arc<serde_json::Error>),

    /// The server answered 2xx but reported an application-level error in the response
    /// envelope.
    #[error("server reported error: {message}")]
    Api {
        /// Error message from the response envelope.
        message: String,
    },

    /// The operation was refused by a client-side guard before any work was done (e.g., the
    /// visitor denied consent).
    #[error("operation blocked: {reason}")]
    Blocked {
        /// Why the guard refused the operation.
        reason: &'static str,
    },
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::SchemaValidation(Arc::new(value))
    }
}

/// Terminal failures produced by [`Transport::send`][crate::transport::Transport::send].
///
/// 503 responses are consumed internally by the retry loop and only surface as
/// [`TransportError::Retryable`] once retries are exhausted.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// The request did not settle before the configured deadline. The in-flight request is
    /// cancelled; from the caller's perspective this is indistinguishable from the server never
    /// responding.
    #[error("request timed out")]
    Timeout,

    /// Every attempt (initial plus retries) received a retryable response. Carries the status of
    /// the last attempt.
    #[error("retries exhausted, last status {status}")]
    Retryable {
        /// HTTP status code of the last attempt.
        status: u16,
    },

    /// The server returned a non-2xx response that is not worth retrying.
    #[error("non-retryable response, status {status}")]
    NonRetryable {
        /// HTTP status code of the response.
        status: u16,
    },

    /// The request body cannot be replayed for a retry attempt (streaming body). The SDK only
    /// sends buffered bodies, so hitting this indicates a caller bug.
    #[error("request body is not replayable")]
    NotReplayable,

    /// Network-level failure or a non-HTTP error raised by the underlying client.
    #[error(transparent)]
    Unknown(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        TransportError::Unknown(Arc::new(value.without_url()))
    }
}
