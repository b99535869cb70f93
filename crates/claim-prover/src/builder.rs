//! Proof request construction from claim events.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::{
    rpc::{ChainClient, ChainReader},
    slot::{left_pad_address, mapping_slot},
    types::{ClaimEvent, CustomInput, ProofRequest, StorageProofEntry},
};

/// Builds proof requests over the balances of a token contract.
#[derive(Debug, Clone)]
pub struct ProofRequestBuilder<C> {
    reader: ChainReader<C>,
    token_address: Address,
    balance_slot: U256,
}

impl<C: ChainClient> ProofRequestBuilder<C> {
    /// Creates a new builder reading balances of `token_address`, whose
    /// balance mapping lives at `balance_slot`.
    pub const fn new(reader: ChainReader<C>, token_address: Address, balance_slot: U256) -> Self {
        Self { reader, token_address, balance_slot }
    }

    /// Builds the proof request for `event`.
    ///
    /// Both balances are read at the same block, the first one that includes
    /// the claim transaction. Failed reads are passed through as empty values.
    pub async fn build(&self, event: &ClaimEvent) -> ProofRequest {
        let block_number = self.reader.resolve_block_number(event.tx_hash).await;

        let challenger_slot = mapping_slot(event.challenger_address, self.balance_slot);
        let lp_slot = mapping_slot(event.lp_address, self.balance_slot);

        let token = self.token_address.to_checksum(None);
        let (challenger_value, lp_value) = tokio::join!(
            self.reader.read_storage(&token, challenger_slot, block_number),
            self.reader.read_storage(&token, lp_slot, block_number),
        );

        debug!(
            block_number,
            %challenger_slot,
            %lp_slot,
            "Built proof request"
        );

        ProofRequest {
            storage: [
                StorageProofEntry {
                    address: self.token_address,
                    block_number,
                    slot: challenger_slot,
                    value: challenger_value,
                },
                StorageProofEntry {
                    address: self.token_address,
                    block_number,
                    slot: lp_slot,
                    value: lp_value,
                },
            ],
            custom_input: CustomInput {
                challenger_address: left_pad_address(event.challenger_address),
                order_hash: event.order_hash,
            },
        }
    }
}
