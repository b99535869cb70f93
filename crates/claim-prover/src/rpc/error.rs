//! RPC-specific error types.

use alloy::transports::TransportError;
use thiserror::Error;

/// Chain RPC error type.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport error from alloy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Receipt not found for a transaction.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Invalid response from RPC.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl RpcError {
    /// Returns true if this error is transient and the operation should be retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Connection(_))
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
