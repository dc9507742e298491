//! Fixed-shape calldata: ERC-20 `transfer(address,uint256)` and the
//! forwarder's `nonces(address)` view.

use alloy_primitives::{keccak256, Address, U256};

/// Canonical signature of the ERC-20 transfer function.
pub const ERC20_TRANSFER_SIG: &str = "transfer(address,uint256)";

/// Canonical signature of the forwarder's nonce view.
pub const FORWARDER_NONCES_SIG: &str = "nonces(address)";

/// First four bytes of the Keccak-256 of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A 20-byte address left-padded into a 32-byte ABI word.
pub fn address_word(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

/// A 256-bit integer as a big-endian 32-byte ABI word.
pub fn uint_word(value: &U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// A 64-bit integer widened into a 32-byte ABI word.
pub fn u64_word(value: u64) -> [u8; 32] {
    uint_word(&U256::from(value))
}

/// Build the inner `transfer(to, amount)` calldata.
///
/// Layout: `selector(4) || leftpad32(to) || be32(amount)`, 68 bytes, no
/// dynamic sections.
pub fn transfer_calldata(to: &Address, amount: &U256) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&selector(ERC20_TRANSFER_SIG));
    data.extend_from_slice(&address_word(to));
    data.extend_from_slice(&uint_word(amount));
    data
}

/// Build the `nonces(owner)` calldata for reading a user's forwarder nonce.
pub fn nonces_calldata(owner: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector(FORWARDER_NONCES_SIG));
    data.extend_from_slice(&address_word(owner));
    data
}
