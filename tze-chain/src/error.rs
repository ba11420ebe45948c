//! Error types for node and index-service access.

use thiserror::Error;
use tze_codec::{CodecError, OutPoint};

/// Result type alias for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors raised by the node RPC and index-service collaborators.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("unexpected HTTP status: {0}")]
    Status(u16),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error (code: {code}): {message}")]
    Rpc { code: i64, message: String },

    /// The node kept reporting a full work queue.
    #[error("node work queue is full, retries exhausted")]
    WorkQueueFull,

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// GraphQL errors returned by the index service.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value in a response failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Local I/O, e.g. reading the RPC cookie file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::InvalidResponse(err.to_string())
    }
}

/// Why the state root preceding a Verify transaction could not be determined.
///
/// Display code shows these as "could not be determined"; they are never
/// replaced by a zero root.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The transaction has no TZE-marked input.
    #[error("transaction has no TZE input")]
    NoTzeInput,

    /// The input does not reference a previous output.
    #[error("input does not spend a previous output")]
    NotASpend,

    /// The previous transaction could not be fetched.
    #[error("previous transaction {txid} unavailable: {source}")]
    Fetch {
        txid: String,
        #[source]
        source: ChainError,
    },

    /// The previous transaction has no output with the referenced index.
    #[error("output {0} does not exist")]
    OutputOutOfRange(OutPoint),

    /// The referenced output is not TZE-framed.
    #[error("output {0} is not a TZE output")]
    NotTze(OutPoint),
}
