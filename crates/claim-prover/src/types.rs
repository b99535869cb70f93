//! Claim, proof request and settlement types.

use std::fmt;

use alloy::primitives::{Address, B256, BlockNumber, Bytes, TxHash};
use serde::{Deserialize, Serialize};

use crate::constants::{CHALLENGER_ENTRY_INDEX, LP_ENTRY_INDEX, STORAGE_ENTRY_COUNT};

/// A challenger disputing a liquidity provider's order.
///
/// Decoded from the JSON payload of a claim message:
/// `{ "challengerAddress", "lpAddress", "orderHash", "txHash" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimEvent {
    /// Account raising the claim.
    pub challenger_address: Address,
    /// Liquidity provider whose order is disputed.
    pub lp_address: Address,
    /// Hash of the disputed order.
    pub order_hash: B256,
    /// Transaction whose effects the proof must observe.
    pub tx_hash: TxHash,
}

/// A single storage fact the prover attests to.
///
/// `value` is `None` when the storage read failed; such an entry must never
/// reach the prover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProofEntry {
    /// Contract whose storage is read.
    pub address: Address,
    /// Block the value was read at.
    pub block_number: BlockNumber,
    /// Storage slot key.
    pub slot: B256,
    /// Raw 32-byte slot content.
    pub value: Option<B256>,
}

/// Application input bound into the proof alongside the storage facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomInput {
    /// Challenger address left-padded to 32 bytes.
    pub challenger_address: B256,
    /// Order hash, unchanged.
    pub order_hash: B256,
}

/// Everything the prover needs for one claim.
///
/// Entry positions are part of the circuit's interface: the challenger's
/// balance is always at index 0 and the liquidity provider's at index 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// Storage entries, ordered by role.
    pub storage: [StorageProofEntry; STORAGE_ENTRY_COUNT],
    /// Custom circuit input.
    pub custom_input: CustomInput,
}

impl ProofRequest {
    /// Returns the challenger's storage entry.
    pub const fn challenger(&self) -> &StorageProofEntry {
        &self.storage[CHALLENGER_ENTRY_INDEX]
    }

    /// Returns the liquidity provider's storage entry.
    pub const fn lp(&self) -> &StorageProofEntry {
        &self.storage[LP_ENTRY_INDEX]
    }

    /// Returns the index of the first entry whose storage read came back empty.
    pub fn first_missing_value(&self) -> Option<usize> {
        self.storage.iter().position(|entry| entry.value.is_none())
    }

    /// Returns the block both entries were read at, if they agree.
    pub fn block_number(&self) -> Option<BlockNumber> {
        let first = self.storage[0].block_number;
        self.storage.iter().all(|e| e.block_number == first).then_some(first)
    }
}

/// Error code reported by the prover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProverErrorCode {
    /// Receipt, storage or transaction input was rejected.
    #[serde(rename = "ERROR_INVALID_INPUT")]
    InvalidInput,
    /// The custom circuit input was rejected.
    #[serde(rename = "ERROR_INVALID_CUSTOM_INPUT")]
    InvalidCustomInput,
    /// The prover accepted the input but could not produce a proof.
    #[serde(rename = "ERROR_FAILED_TO_PROVE")]
    FailedToProve,
    /// A code this service does not recognise.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ProverErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::InvalidInput => "invalid-input",
            Self::InvalidCustomInput => "invalid-custom-input",
            Self::FailedToProve => "proof-generation-failed",
            Self::Unknown => "unknown",
        };
        f.write_str(code)
    }
}

/// Structured error returned by the prover in place of a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverFailure {
    /// Error code.
    pub code: ProverErrorCode,
    /// Human readable detail.
    #[serde(rename = "msg", default)]
    pub message: String,
}

/// Outcome of a proving call that reached the prover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofResult {
    /// Opaque proof bytes.
    Proof(Bytes),
    /// The prover refused or failed to prove.
    Failed(ProverFailure),
}

/// Key identifying a proof query on the attestation network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryKey {
    /// Query hash, also used as the on-chain proof id.
    pub query_hash: B256,
    /// Query nonce.
    pub nonce: u64,
}

/// Proof of a completed settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Hash of the settlement request transaction.
    pub tx_hash: TxHash,
    /// Attestation query that settled.
    pub query_key: QueryKey,
}
