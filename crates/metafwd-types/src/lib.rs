//! Shared types for the metafwd toolkit.
//!
//! - `MetaTx`: a gasless ERC-20 transfer intent
//! - `Signature`: 65-byte r‖s‖v ECDSA record
//! - `BatchRequest`: a signed intent, ready for `executeBatch`
//! - `MetaFwdError`: the toolkit-wide error sum

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetaFwdError>;

/// Which RPC interaction a relay failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStage {
    GasPrice,
    PendingNonce,
    EstimateGas,
    ChainId,
    SendTransaction,
    Call,
}

impl std::fmt::Display for RpcStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RpcStage::GasPrice => "gas-price",
            RpcStage::PendingNonce => "pending-nonce",
            RpcStage::EstimateGas => "estimate-gas",
            RpcStage::ChainId => "chain-id",
            RpcStage::SendTransaction => "send-transaction",
            RpcStage::Call => "call",
        };
        f.write_str(name)
    }
}

/// Toolkit error types.
#[derive(Debug, Error)]
pub enum MetaFwdError {
    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("deadline has expired")]
    ExpiredDeadline,

    #[error("{field} cannot be the zero address")]
    ZeroAddress { field: &'static str },

    #[error("amount must be strictly positive")]
    InvalidAmount,

    #[error("invalid nonce at index {index}: expected {expected}, got {actual}")]
    InvalidNonce {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("request at index {index} is not from {expected}, got {actual}")]
    MixedBatchSenders {
        index: usize,
        expected: Address,
        actual: Address,
    },

    #[error("batch cannot be empty")]
    EmptyBatch,

    #[error("operation cancelled")]
    Cancelled,

    #[error("crypto primitive failure: {0}")]
    CryptoFailure(String),

    #[error("rpc failure at {stage}: {message}")]
    RpcFailure { stage: RpcStage, message: String },

    #[error("request at index {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<MetaFwdError>,
    },

    #[error("abi encoding invariant violated: {0}")]
    EncodingBug(&'static str),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

impl MetaFwdError {
    /// Wrap an error with the batch index it occurred at.
    pub fn at_index(self, index: usize) -> Self {
        MetaFwdError::BatchItem {
            index,
            source: Box::new(self),
        }
    }
}

/// A meta transaction: an ERC-20 transfer intent to be executed through an
/// ERC2771Forwarder on behalf of `from`.
///
/// `to` is the token recipient; `token` is the ERC-20 contract and becomes
/// the forwarder's call target. `gas` bounds the inner call, `nonce` is the
/// forwarder-tracked replay counter for `from`, and `deadline` is a Unix
/// timestamp in seconds (uint48 on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTx {
    pub from: Address,
    pub to: Address,
    pub token: Address,
    pub amount: U256,
    pub gas: u64,
    pub nonce: u64,
    pub deadline: u64,
}

/// An ECDSA signature in Ethereum's 65-byte wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    /// Serialize to the canonical `r || s || v` layout.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// Parse from the canonical 65-byte layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != 65 {
            return Err(MetaFwdError::InvalidSignatureLength(data.len()));
        }
        let mut sig = Signature {
            r: [0u8; 32],
            s: [0u8; 32],
            v: data[64],
        };
        sig.r.copy_from_slice(&data[0..32]);
        sig.s.copy_from_slice(&data[32..64]);
        Ok(sig)
    }
}

/// A signed meta transaction, one element of an `executeBatch` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub meta_tx: MetaTx,
    pub signature: Signature,
}

/// An ordered batch of signed meta transactions.
pub type BatchRequestList = Vec<BatchRequest>;

/// Total ETH value carried by a batch.
///
/// ERC-20 transfers carry no ETH, so this is always zero today; it exists so
/// the outer transaction's value stays correct if value-bearing inner calls
/// are ever added.
pub fn batch_total_value(_batch: &[BatchRequest]) -> U256 {
    U256::ZERO
}

/// Encode bytes as a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string (with or without 0x prefix) into bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(stripped).map_err(|e| MetaFwdError::InvalidHex(e.to_string()))
}

/// Parse a 20-byte address from a hex string.
pub fn parse_address(hex_str: &str) -> Result<Address> {
    let bytes = hex_to_bytes(hex_str)?;
    if bytes.len() != 20 {
        return Err(MetaFwdError::InvalidHex(format!(
            "expected 20 address bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn signature_round_trips_through_bytes() {
        let sig = Signature {
            r: [0x11; 32],
            s: [0x22; 32],
            v: 27,
        };
        let bytes = sig.to_bytes();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[64], 27);
        assert_eq!(Signature::from_bytes(&bytes).unwrap(), sig);
    }

    #[test]
    fn signature_rejects_wrong_length() {
        let err = Signature::from_bytes(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, MetaFwdError::InvalidSignatureLength(64)));
    }

    #[test]
    fn batch_value_is_zero() {
        assert_eq!(batch_total_value(&[]), U256::ZERO);
    }

    #[test]
    fn parse_address_accepts_prefixed_hex() {
        let addr = parse_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap();
        assert_eq!(
            addr.as_slice(),
            hex!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
    }

    #[test]
    fn parse_address_rejects_short_input() {
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn batch_item_error_keeps_index() {
        let err = MetaFwdError::InvalidAmount.at_index(3);
        assert_eq!(err.to_string(), "request at index 3: amount must be strictly positive");
    }
}
