//! Error types for the claim prover.

use std::time::Duration;

use alloy::primitives::{B256, TxHash};
use jsonrpsee::core::ClientError;
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::{
    rpc::RpcError,
    types::{ProverFailure, SettlementReceipt},
};

/// Errors talking to the proving service.
#[derive(Debug, Error)]
pub enum ProverError {
    /// The HTTP client could not be created.
    #[error("Failed to create prover client: {0}")]
    ClientCreation(String),

    /// JSON-RPC call failed.
    #[error("Prover RPC error: {0}")]
    Rpc(#[from] ClientError),

    /// The prover answered with neither a proof nor an error.
    #[error("Invalid prover response: {0}")]
    InvalidResponse(String),
}

/// Errors talking to the attestation network.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// The HTTP client could not be created.
    #[error("Failed to create attestation client: {0}")]
    ClientCreation(String),

    /// JSON-RPC call failed.
    #[error("Attestation RPC error: {0}")]
    Rpc(#[from] ClientError),

    /// The attestation network reported the query as failed.
    #[error("Attestation query {query_hash} failed: {reason}")]
    QueryFailed {
        /// Query hash.
        query_hash: B256,
        /// Reason reported by the network.
        reason: String,
    },

    /// The query did not finalize in time.
    #[error("Attestation query {query_hash} not finalized after {elapsed:?}")]
    Timeout {
        /// Query hash.
        query_hash: B256,
        /// Time spent waiting.
        elapsed: Duration,
    },
}

impl AttestationError {
    /// Returns true if repeating the call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ClientCreation(_) | Self::Rpc(_))
    }
}

/// Errors submitting the settlement transaction.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Chain RPC call failed.
    #[error("Settlement RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The transaction could not be signed.
    #[error("Failed to sign settlement transaction: {0}")]
    Signing(String),

    /// Gas estimation showed the request would revert.
    #[error("Settlement request would revert: {0}")]
    WouldRevert(String),

    /// The transaction was included but reverted.
    #[error("Settlement transaction {tx_hash} reverted")]
    Reverted {
        /// Hash of the reverted transaction.
        tx_hash: TxHash,
    },

    /// The transaction was broadcast but its receipt could not be fetched.
    #[error("Settlement transaction {tx_hash} unconfirmed: {reason}")]
    Unconfirmed {
        /// Hash of the broadcast transaction.
        tx_hash: TxHash,
        /// Underlying failure.
        reason: String,
    },
}

impl SettlementError {
    /// Returns true if the contract rejected the request.
    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::WouldRevert(_) | Self::Reverted { .. })
    }

    /// Returns true if resubmitting may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_retryable(),
            Self::Signing(_) |
            Self::WouldRevert(_) |
            Self::Reverted { .. } |
            Self::Unconfirmed { .. } => false,
        }
    }
}

/// Errors of the Kafka consumer loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Kafka client error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Kafka client configuration could not be loaded.
    #[error("Kafka configuration error: {0}")]
    Config(String),

    /// A dead letter could not be serialized.
    #[error("Failed to serialize dead letter: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dead letter could not be published; the source offset was not committed.
    #[error("Failed to publish dead letter for {topic}/{partition}@{offset}: {reason}")]
    DeadLetter {
        /// Source topic.
        topic: String,
        /// Source partition.
        partition: i32,
        /// Source offset.
        offset: i64,
        /// Underlying failure.
        reason: String,
    },

    /// A partition worker stopped unexpectedly.
    #[error("Partition worker failed: {0}")]
    Worker(String),
}

/// What the consumer does with a message after its claim failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient failure: run the claim again after a backoff.
    Retry,
    /// Terminal failure: publish the message to the dead-letter topic, then commit.
    DeadLetter,
    /// Nothing more to do: commit.
    Commit,
}

/// Failure of the claim pipeline for one message.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The message payload is not a claim event.
    #[error("Failed to decode claim event: {0}")]
    Decode(String),

    /// A storage read came back empty.
    #[error("Storage value missing for entry {index}")]
    MissingStorage {
        /// Index of the entry in the proof request.
        index: usize,
    },

    /// No usable block number could be resolved.
    #[error("Block number unavailable")]
    BlockUnavailable,

    /// The prover refused or failed to prove the request.
    #[error("Prover rejected request ({}): {}", .0.code, .0.message)]
    ProverRejected(ProverFailure),

    /// The prover could not be reached.
    #[error(transparent)]
    Prover(#[from] ProverError),

    /// The attestation network failed.
    #[error(transparent)]
    Attestation(#[from] AttestationError),

    /// The settlement transaction failed.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// The settlement request is on chain but its query did not finalize.
    ///
    /// Running the claim again would pay for a second request.
    #[error(
        "Settlement {} for query {} (nonce {}) not finalized: {source}",
        .receipt.tx_hash,
        .receipt.query_key.query_hash,
        .receipt.query_key.nonce
    )]
    Unfinalized {
        /// The confirmed settlement request.
        receipt: SettlementReceipt,
        /// Last finality failure.
        source: AttestationError,
    },
}

impl PipelineError {
    /// Returns a stable label for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::MissingStorage { .. } => "missing_storage",
            Self::BlockUnavailable => "block_unavailable",
            Self::ProverRejected(_) => "prover_rejected",
            Self::Prover(_) => "prover",
            Self::Attestation(_) => "attestation",
            Self::Settlement(e) if e.is_revert() => "settlement_reverted",
            Self::Settlement(_) => "settlement",
            Self::Unfinalized { .. } => "unfinalized",
        }
    }

    /// Returns what the consumer should do with the message.
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::Decode(_) | Self::ProverRejected(_) => Disposition::DeadLetter,
            Self::MissingStorage { .. } | Self::BlockUnavailable => Disposition::Retry,
            Self::Prover(ProverError::InvalidResponse(_)) => Disposition::DeadLetter,
            Self::Prover(_) => Disposition::Retry,
            Self::Attestation(e) if e.is_retryable() => Disposition::Retry,
            Self::Attestation(_) => Disposition::DeadLetter,
            Self::Settlement(e) if e.is_revert() => Disposition::Commit,
            Self::Settlement(e) if e.is_retryable() => Disposition::Retry,
            Self::Settlement(_) => Disposition::DeadLetter,
            Self::Unfinalized { .. } => Disposition::DeadLetter,
        }
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
