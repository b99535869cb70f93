//! Degrading chain reader used by the proof request builder.

use std::sync::Arc;

use alloy::primitives::{Address, B256, BlockNumber, TxHash};
use tracing::{debug, error, warn};

use super::ChainClient;

/// Read-only adapter over a [`ChainClient`] that never fails.
///
/// Block resolution degrades to the chain head (and finally to 0), and storage
/// reads degrade to an empty value. Callers must validate what they get back.
#[derive(Debug)]
pub struct ChainReader<C> {
    client: Arc<C>,
}

impl<C> Clone for ChainReader<C> {
    fn clone(&self) -> Self {
        Self { client: Arc::clone(&self.client) }
    }
}

impl<C: ChainClient> ChainReader<C> {
    /// Creates a new reader over the given client.
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Returns the first block that includes the effects of `tx_hash`.
    ///
    /// That is the receipt's block plus one. When the receipt is unavailable
    /// the current head is used; when the head is unavailable too, 0.
    pub async fn resolve_block_number(&self, tx_hash: TxHash) -> BlockNumber {
        match self.client.receipt_block_number(tx_hash).await {
            Ok(block) => return block.saturating_add(1),
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "Receipt unavailable, falling back to head block");
            }
        }

        match self.client.block_number().await {
            Ok(head) => head,
            Err(e) => {
                error!(tx_hash = %tx_hash, error = %e, "Failed to fetch head block number");
                0
            }
        }
    }

    /// Reads a storage slot of the contract at `address`, given as a string.
    ///
    /// Returns `None` without touching the network when `address` is not a
    /// well-formed address, and `None` when the RPC read fails.
    pub async fn read_storage(
        &self,
        address: &str,
        slot: B256,
        block_number: BlockNumber,
    ) -> Option<B256> {
        if !is_valid_address(address) {
            error!(address, "Invalid contract address, skipping storage read");
            return None;
        }
        let address = address.parse::<Address>().ok()?;
        self.read_storage_at(address, slot, block_number).await
    }

    /// Reads a storage slot of the contract at `address`.
    pub async fn read_storage_at(
        &self,
        address: Address,
        slot: B256,
        block_number: BlockNumber,
    ) -> Option<B256> {
        match self.client.storage_at(address, slot, block_number).await {
            Ok(value) => {
                debug!(%address, %slot, block_number, %value, "Read storage slot");
                Some(value)
            }
            Err(e) => {
                error!(%address, %slot, block_number, error = %e, "Failed to read storage slot");
                None
            }
        }
    }
}

/// Returns true if `s` is `0x` followed by 40 hex characters.
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn is_valid_address(s: &str) -> bool {
    let Some(hex) = s.strip_prefix("0x") else {
        return false;
    };
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(s, None).is_ok();
    }
    true
}
