//! EIP-712 hashing for the ERC2771Forwarder `ForwardRequest` schema.
//!
//! The byte layout here must match what the deployed forwarder computes
//! on-chain; a single byte of drift produces signatures the contract
//! rejects. Only the fixed `ForwardRequest` schema is supported.

use std::sync::LazyLock;

use alloy_primitives::{keccak256, Address, B256, U256};
use metafwd_abi::calldata::{address_word, transfer_calldata, u64_word, uint_word};
use metafwd_types::MetaTx;

/// Type string of the EIP-712 domain.
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Type string of the forwarder's request struct. Note the six fields: the
/// call-level `signature` is not part of the typed data, and `nonce` is —
/// the forwarder checks it against its own counter.
pub const FORWARD_REQUEST_TYPE: &str =
    "ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,uint48 deadline,bytes data)";

/// Domain name fixed by the ERC2771Forwarder deployment.
pub const FORWARDER_DOMAIN_NAME: &str = "ERC2771Forwarder";

/// Domain version fixed by the ERC2771Forwarder deployment.
pub const FORWARDER_DOMAIN_VERSION: &str = "1";

pub static DOMAIN_TYPEHASH: LazyLock<B256> =
    LazyLock::new(|| keccak256(DOMAIN_TYPE.as_bytes()));

pub static FORWARD_REQUEST_TYPEHASH: LazyLock<B256> =
    LazyLock::new(|| keccak256(FORWARD_REQUEST_TYPE.as_bytes()));

/// Build an EIP-712 domain separator.
pub fn domain_separator(
    name: &str,
    version: &str,
    chain_id: u64,
    verifying_contract: &Address,
) -> B256 {
    let mut data = Vec::with_capacity(32 * 5);
    data.extend_from_slice(DOMAIN_TYPEHASH.as_slice());
    data.extend_from_slice(keccak256(name.as_bytes()).as_slice());
    data.extend_from_slice(keccak256(version.as_bytes()).as_slice());
    data.extend_from_slice(&u64_word(chain_id));
    data.extend_from_slice(&address_word(verifying_contract));
    keccak256(&data)
}

/// Domain separator for an ERC2771Forwarder deployment on a given chain.
pub fn forwarder_domain_separator(chain_id: u64, verifying_contract: &Address) -> B256 {
    domain_separator(
        FORWARDER_DOMAIN_NAME,
        FORWARDER_DOMAIN_VERSION,
        chain_id,
        verifying_contract,
    )
}

/// Hash a `MetaTx` as the forwarder's `ForwardRequest` struct.
///
/// The typed `to` field is the token contract: the forwarder's outer call
/// targets the token, and the transfer recipient is bound via the hash of
/// the inner calldata. `value` is zero for ERC-20 transfers. `deadline` is
/// uint48 in the schema but occupies a full word in the hash input.
pub fn struct_hash(meta_tx: &MetaTx) -> B256 {
    let inner = transfer_calldata(&meta_tx.to, &meta_tx.amount);

    let mut data = Vec::with_capacity(32 * 8);
    data.extend_from_slice(FORWARD_REQUEST_TYPEHASH.as_slice());
    data.extend_from_slice(&address_word(&meta_tx.from));
    data.extend_from_slice(&address_word(&meta_tx.token));
    data.extend_from_slice(&uint_word(&U256::ZERO));
    data.extend_from_slice(&u64_word(meta_tx.gas));
    data.extend_from_slice(&u64_word(meta_tx.nonce));
    data.extend_from_slice(&u64_word(meta_tx.deadline));
    data.extend_from_slice(keccak256(&inner).as_slice());
    keccak256(&data)
}

/// The digest the user signs: `keccak256(0x19 || 0x01 || domainSeparator ||
/// structHash)`.
pub fn digest(meta_tx: &MetaTx, domain_separator: &B256) -> B256 {
    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain_separator.as_slice());
    data.extend_from_slice(struct_hash(meta_tx).as_slice());
    keccak256(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use sha3::{Digest, Keccak256};

    fn sample_meta_tx() -> MetaTx {
        MetaTx {
            from: Address::from_slice(&hex!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
            to: Address::from_slice(&hex!("70997970C51812dc3A010C7d01b50e0d17dc79C8")),
            token: Address::from_slice(&hex!("5FbDB2315678afecb367f032d93F642f64180aa3")),
            amount: U256::from(1_000_000_000_000_000_000u64),
            gas: 100_000,
            nonce: 0,
            deadline: 2_000_000_000,
        }
    }

    #[test]
    fn keccak_known_vectors() {
        assert_eq!(
            keccak256(b"").as_slice(),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
        assert_eq!(
            keccak256(b"abc").as_slice(),
            hex!("4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45")
        );
    }

    #[test]
    fn domain_typehash_matches_known_value() {
        assert_eq!(
            DOMAIN_TYPEHASH.as_slice(),
            hex!("8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f")
        );
    }

    // Recompute the separator with an independent Keccak implementation to
    // guard against drift in the concatenation order.
    #[test]
    fn domain_separator_cross_checked_against_sha3() {
        let contract = Address::from_slice(&hex!("0000000000000000000000000000000000000001"));
        let ours = forwarder_domain_separator(1, &contract);

        let mut hasher = Keccak256::new();
        hasher.update(Keccak256::digest(DOMAIN_TYPE.as_bytes()));
        hasher.update(Keccak256::digest(b"ERC2771Forwarder"));
        hasher.update(Keccak256::digest(b"1"));
        let mut chain_word = [0u8; 32];
        chain_word[31] = 1;
        hasher.update(chain_word);
        let mut contract_word = [0u8; 32];
        contract_word[12..].copy_from_slice(contract.as_slice());
        hasher.update(contract_word);

        assert_eq!(ours.as_slice(), hasher.finalize().as_slice());
    }

    #[test]
    fn struct_hash_binds_every_field() {
        let base = sample_meta_tx();
        let base_hash = struct_hash(&base);

        let mutations: Vec<MetaTx> = vec![
            MetaTx {
                from: Address::from_slice(&hex!("0000000000000000000000000000000000000009")),
                ..base.clone()
            },
            MetaTx {
                to: Address::from_slice(&hex!("0000000000000000000000000000000000000009")),
                ..base.clone()
            },
            MetaTx {
                token: Address::from_slice(&hex!("0000000000000000000000000000000000000009")),
                ..base.clone()
            },
            MetaTx {
                amount: base.amount + U256::from(1u64),
                ..base.clone()
            },
            MetaTx {
                gas: base.gas + 1,
                ..base.clone()
            },
            MetaTx {
                nonce: base.nonce + 1,
                ..base.clone()
            },
            MetaTx {
                deadline: base.deadline + 1,
                ..base.clone()
            },
        ];

        for mutated in mutations {
            assert_ne!(struct_hash(&mutated), base_hash, "{mutated:?}");
        }
    }

    #[test]
    fn digest_depends_on_domain() {
        let meta_tx = sample_meta_tx();
        let contract = Address::from_slice(&hex!("0000000000000000000000000000000000000001"));
        let mainnet = forwarder_domain_separator(1, &contract);
        let testnet = forwarder_domain_separator(11155111, &contract);

        assert_ne!(mainnet, testnet);
        assert_ne!(digest(&meta_tx, &mainnet), digest(&meta_tx, &testnet));
    }

    #[test]
    fn hashing_is_deterministic() {
        let meta_tx = sample_meta_tx();
        let contract = Address::from_slice(&hex!("0000000000000000000000000000000000000001"));
        let ds = forwarder_domain_separator(1, &contract);
        assert_eq!(digest(&meta_tx, &ds), digest(&meta_tx, &ds));
        assert_eq!(
            forwarder_domain_separator(1, &contract),
            forwarder_domain_separator(1, &contract)
        );
    }
}
