//! Error types for the TZE codec.
//!
//! Payload decoders never fail; these errors only cover values supplied by a
//! caller (identifiers, digests, hex arguments).

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while parsing caller-supplied values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Text was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A fixed-width value had the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A verifier id was not of the form `<txid>:<outputIndex>`.
    #[error("invalid verifier id: {0}")]
    InvalidVerifierId(String),
}
