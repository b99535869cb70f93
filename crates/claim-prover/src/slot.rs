//! Storage slot derivation for Solidity mappings.

use alloy::primitives::{Address, B256, U256, keccak256};

/// Left-pads an address to 32 bytes, as `abi.encode` does.
pub fn left_pad_address(address: Address) -> B256 {
    address.into_word()
}

/// Computes the storage key of `mapping(address => T)` at `base_slot` for `owner`.
///
/// The key is `keccak256(abi.encode(owner, base_slot))`: the owner left-padded
/// to 32 bytes followed by the base slot as a 32-byte big-endian integer.
pub fn mapping_slot(owner: Address, base_slot: U256) -> B256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left_pad_address(owner).as_slice());
    data[32..].copy_from_slice(&base_slot.to_be_bytes::<32>());
    keccak256(data)
}
