use std::time::Duration;

use thiserror::Error;

/// The only error kinds that cross the client boundary.
///
/// `Config` is fatal and raised before any network activity; `RequestFailed`
/// wraps every transport, HTTP, or decoding failure of a single call after
/// the retry budget is spent, and is recoverable at the phase level.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Transport-internal failure of one attempt. Never escapes the client:
/// the retry layer classifies it and `execute` converts whatever survives
/// into [`ClientError::RequestFailed`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout: anything below HTTP.
    #[error("request error ({kind}): {detail}")]
    Network { kind: &'static str, detail: String },

    /// Non-success HTTP status. `detail` is the gateway's error message when
    /// the body parses as JSON, the raw body text otherwise. `retry_after`
    /// carries the server's `Retry-After` hint when one was sent.
    #[error("HTTP {status}: {detail}")]
    Status {
        status: u16,
        detail: String,
        retry_after: Option<Duration>,
    },

    /// The success body was not valid JSON.
    #[error("JSON parsing error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether another attempt may succeed. Network and status failures
    /// retry; a success response with an unreadable body does not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}
