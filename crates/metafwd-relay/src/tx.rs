//! Legacy (type-0) outer transaction: RLP encoding and EIP-155 signing.
//!
//! Unsigned payload: `[nonce, gasPrice, gasLimit, to, value, data, chainId,
//! 0, 0]`. Signed payload replaces the trailer with `[v, r, s]` where
//! `v = 35 + 2 * chainId + yParity`.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use k256::ecdsa::SigningKey;
use metafwd_types::{MetaFwdError, Result};

/// An unsigned legacy transaction.
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: B256,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

#[derive(RlpEncodable)]
struct UnsignedEip155 {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    chain_id: u64,
    zero_r: u8,
    zero_s: u8,
}

#[derive(RlpEncodable)]
struct SignedEip155 {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

/// The EIP-155 signing hash of a transaction on the given chain.
pub fn sighash_eip155(tx: &LegacyTransaction, chain_id: u64) -> B256 {
    let unsigned = UnsignedEip155 {
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        chain_id,
        zero_r: 0,
        zero_s: 0,
    };
    let mut buf = Vec::new();
    unsigned.encode(&mut buf);
    keccak256(&buf)
}

/// Sign a legacy transaction with replay protection for `chain_id`.
pub fn sign_eip155(
    tx: &LegacyTransaction,
    chain_id: u64,
    key: &SigningKey,
) -> Result<SignedTransaction> {
    let sighash = sighash_eip155(tx, chain_id);

    let (signature, recovery_id) = key
        .sign_prehash_recoverable(sighash.as_slice())
        .map_err(|e| MetaFwdError::CryptoFailure(e.to_string()))?;

    let sig_bytes = signature.to_bytes();
    let r = U256::from_be_slice(&sig_bytes[0..32]);
    let s = U256::from_be_slice(&sig_bytes[32..64]);
    let v = 35 + 2 * chain_id + recovery_id.to_byte() as u64;

    let signed = SignedEip155 {
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        v,
        r,
        s,
    };
    let mut raw = Vec::new();
    signed.encode(&mut raw);
    let hash = keccak256(&raw);

    Ok(SignedTransaction { raw, hash, v, r, s })
}
