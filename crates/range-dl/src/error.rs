//! Error types for range-dl

use thiserror::Error;

/// Failure of a single Range request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The transfer-wide cancellation signal fired while the request was pending.
    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    /// The origin announced a body that cannot be the requested range,
    /// typically a 200 carrying the whole file.
    #[error("response announces {announced} bytes for a {expected}-byte range")]
    RangeNotHonored { expected: u64, announced: u64 },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

/// Failure of the single-stream proxy download
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("proxy request failed: {0}")]
    Request(String),

    #[error("proxy returned HTTP {0}")]
    Status(u16),

    #[error("proxy response has no usable content length")]
    MissingContentLength,

    #[error("stream read failed after {received} bytes: {message}")]
    Read { received: u64, message: String },

    #[error("stream ended after {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("invalid transfer config: {0}")]
    InvalidConfig(String),

    #[error("could not determine file size")]
    SizeUnknown,

    #[error("size probe failed: {0}")]
    Probe(#[source] FetchError),

    #[error("failed to download chunk {index}: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: FetchError,
    },

    #[error("chunk {index} returned {actual} bytes, expected {expected}")]
    ChunkLengthMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("transfer ended with {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    #[error("fallback download failed: no file identifier available")]
    MissingFileId,

    #[error("both primary and fallback downloads failed: {0}")]
    Fallback(#[source] FallbackError),

    #[error("download stopped")]
    Stopped,
}

impl TransferError {
    /// Errors raised by the fallback tier. Nothing escalates past these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferError::MissingFileId | TransferError::Fallback(_) | TransferError::Stopped
        )
    }
}
