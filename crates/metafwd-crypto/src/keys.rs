//! secp256k1 key handling: generation, parsing, address derivation,
//! digest signing, and address recovery.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use metafwd_types::{MetaFwdError, Result};
use rand_core::OsRng;
use zeroize::Zeroize;

/// Generate a fresh private key from the OS CSPRNG.
pub fn generate_private_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Parse a private key from a hex string (with or without 0x prefix).
///
/// The intermediate byte buffer is wiped before returning.
pub fn private_key_from_hex(hex_key: &str) -> Result<SigningKey> {
    let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
    let mut bytes =
        hex::decode(stripped).map_err(|e| MetaFwdError::InvalidHex(e.to_string()))?;
    let key = SigningKey::from_slice(&bytes)
        .map_err(|e| MetaFwdError::CryptoFailure(e.to_string()));
    bytes.zeroize();
    key
}

/// Derive the Ethereum address of a public key: the low 20 bytes of the
/// Keccak-256 of the uncompressed point without its 0x04 tag.
pub fn address_from_public(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

/// Derive the Ethereum address controlled by a private key.
pub fn address_of(key: &SigningKey) -> Address {
    address_from_public(key.verifying_key())
}

/// Sign a 32-byte digest, returning the 65-byte `r || s || v` layout with
/// `v` in {27, 28}.
pub fn sign_digest(key: &SigningKey, digest: &B256) -> Result<[u8; 65]> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| MetaFwdError::CryptoFailure(e.to_string()))?;

    let mut out = [0u8; 65];
    out[0..64].copy_from_slice(&signature.to_bytes()[..]);
    out[64] = 27 + recovery_id.to_byte();
    Ok(out)
}

/// Recover the signer address from a digest and a 65-byte signature.
///
/// Accepts `v` in {0, 1} as well as {27, 28}; anything else, or a malformed
/// curve point, fails with `RecoveryFailed`.
pub fn recover_address(digest: &B256, sig: &[u8; 65]) -> Result<Address> {
    let v = sig[64];
    let parity = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(parity)
        .ok_or_else(|| MetaFwdError::RecoveryFailed(format!("invalid recovery id {v}")))?;

    let signature = EcdsaSignature::from_slice(&sig[0..64])
        .map_err(|e| MetaFwdError::RecoveryFailed(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
        .map_err(|e| MetaFwdError::RecoveryFailed(e.to_string()))?;
    Ok(address_from_public(&key))
}
