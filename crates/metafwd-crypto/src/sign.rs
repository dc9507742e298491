//! Signing and verification of meta transactions.

use alloy_primitives::B256;
use k256::ecdsa::SigningKey;
use metafwd_types::{MetaTx, Result, Signature};

use crate::eip712;
use crate::keys;

/// Sign a meta transaction with the user's private key under the given
/// domain separator.
pub fn sign_meta_tx(
    meta_tx: &MetaTx,
    user_key: &SigningKey,
    domain_separator: &B256,
) -> Result<Signature> {
    let digest = eip712::digest(meta_tx, domain_separator);
    let sig_bytes = keys::sign_digest(user_key, &digest)?;
    Signature::from_bytes(&sig_bytes)
}

/// Verify that a signature over a meta transaction recovers to its `from`
/// address.
///
/// A mismatched signer is a negative result, not an error; structural
/// problems (bad recovery id, malformed curve point) surface as
/// `RecoveryFailed`.
pub fn verify_meta_tx(
    meta_tx: &MetaTx,
    signature: &Signature,
    domain_separator: &B256,
) -> Result<bool> {
    let digest = eip712::digest(meta_tx, domain_separator);
    let recovered = keys::recover_address(&digest, &signature.to_bytes())?;
    Ok(recovered == meta_tx.from)
}
