//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding device payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not valid JSON for the expected type.
    #[error("invalid {what} payload: {source}")]
    Decode {
        /// Which payload was being decoded.
        what: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    pub(crate) fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { what, source }
    }
}
