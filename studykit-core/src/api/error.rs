use thiserror::Error;

/// Failure taxonomy for the transport layer.
///
/// `Network`, retryable `Status` codes, and `StreamRead` drive the retry
/// decision; everything else propagates on first occurrence. Terminal
/// failures reach callers of the streaming session only through the
/// completion result, never as a panic or an `Err` from `open`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response was received at all.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status before any body bytes.
    #[error("server returned status {code}: {body}")]
    Status { code: u16, body: String },
    /// The connection dropped while the response body was being read.
    #[error("stream read failed: {0}")]
    StreamRead(String),
    /// A structured payload failed to parse. Recoverable while a stream is
    /// still delivering bytes; terminal for an atomic response body.
    #[error("payload parse failed: {0}")]
    PayloadParse(String),
    /// Bounded retries were used up; wraps the last underlying failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Status code observed before any body bytes, if that is what failed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}
