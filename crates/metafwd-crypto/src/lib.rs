//! Cryptographic pipeline for meta transactions.
//!
//! Flow: `MetaTx` → EIP-712 struct hash → domain-bound digest → secp256k1
//! signature → recovery/verification against the declared sender.

pub mod eip712;
pub mod keys;
pub mod sign;

pub use keys::{
    address_from_public, address_of, generate_private_key, private_key_from_hex, recover_address,
    sign_digest,
};
pub use sign::{sign_meta_tx, verify_meta_tx};
