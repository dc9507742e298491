//! Meta-transaction construction, validation, and batch assembly.
//!
//! - Builders: single intents, delayed deadlines, sequential-nonce batches
//! - Validators: field checks, deadlines, nonce sequences, sender sets
//! - Batch assembly: sign or verify whole batches, cancellable between
//!   elements

use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, U256};
use k256::ecdsa::SigningKey;
use metafwd_crypto::{sign_meta_tx, verify_meta_tx};
use metafwd_types::{BatchRequest, BatchRequestList, MetaFwdError, MetaTx, Result};
use rand_core::{OsRng, RngCore};
use tokio_util::sync::CancellationToken;

/// Gas limit applied by the default-gas constructors.
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Draw a random 64-bit nonce from the OS CSPRNG.
pub fn random_nonce() -> u64 {
    OsRng.next_u64()
}

/// Whether an address is usable as a participant (not the zero address).
pub fn is_valid_address(addr: &Address) -> bool {
    *addr != Address::ZERO
}

/// Convert a whole-ether amount to wei. Convenience for display and test
/// amounts; precision is limited by `f64`.
pub fn to_wei(ether: f64) -> U256 {
    U256::from((ether * 1e18) as u128)
}

/// Convert a wei amount to ether. Precision is limited by `f64`.
pub fn from_wei(wei: &U256) -> f64 {
    let limbs = wei.as_limbs();
    let low = limbs[0] as f64 + (limbs[1] as f64) * (u64::MAX as f64 + 1.0);
    low / 1e18
}

/// Assemble a meta transaction from all fields.
pub fn new_meta_tx(
    from: Address,
    to: Address,
    token: Address,
    amount: U256,
    gas: u64,
    nonce: u64,
    deadline: u64,
) -> MetaTx {
    MetaTx {
        from,
        to,
        token,
        amount,
        gas,
        nonce,
        deadline,
    }
}

/// Assemble a meta transaction expiring `delay_seconds` from now.
pub fn new_meta_tx_with_delay(
    from: Address,
    to: Address,
    token: Address,
    amount: U256,
    gas: u64,
    nonce: u64,
    delay_seconds: u64,
) -> MetaTx {
    let deadline = current_timestamp() + delay_seconds;
    new_meta_tx(from, to, token, amount, gas, nonce, deadline)
}

/// Assemble a meta transaction with the default inner gas limit.
pub fn new_meta_tx_with_default_gas(
    from: Address,
    to: Address,
    token: Address,
    amount: U256,
    nonce: u64,
    deadline: u64,
) -> MetaTx {
    new_meta_tx(from, to, token, amount, DEFAULT_GAS_LIMIT, nonce, deadline)
}

/// Build one meta transaction per recipient with sequential nonces starting
/// at `starting_nonce`.
pub fn new_meta_tx_batch(
    from: Address,
    recipients: &[Address],
    token: Address,
    amounts: &[U256],
    gas: u64,
    starting_nonce: u64,
    deadline: u64,
) -> Result<Vec<MetaTx>> {
    if recipients.len() != amounts.len() {
        return Err(MetaFwdError::LengthMismatch {
            left: recipients.len(),
            right: amounts.len(),
        });
    }

    Ok(recipients
        .iter()
        .zip(amounts)
        .enumerate()
        .map(|(i, (recipient, amount))| {
            new_meta_tx(
                from,
                *recipient,
                token,
                *amount,
                gas,
                starting_nonce + i as u64,
                deadline,
            )
        })
        .collect())
}

/// Sequential-nonce batch with the default inner gas limit.
pub fn new_meta_tx_batch_with_default_gas(
    from: Address,
    recipients: &[Address],
    token: Address,
    amounts: &[U256],
    starting_nonce: u64,
    deadline: u64,
) -> Result<Vec<MetaTx>> {
    new_meta_tx_batch(
        from,
        recipients,
        token,
        amounts,
        DEFAULT_GAS_LIMIT,
        starting_nonce,
        deadline,
    )
}

/// Check the structural invariants of a meta transaction: nonzero
/// addresses, strictly positive amount, nonzero deadline.
pub fn validate_meta_tx(meta_tx: &MetaTx) -> Result<()> {
    if !is_valid_address(&meta_tx.from) {
        return Err(MetaFwdError::ZeroAddress { field: "from" });
    }
    if !is_valid_address(&meta_tx.to) {
        return Err(MetaFwdError::ZeroAddress { field: "to" });
    }
    if !is_valid_address(&meta_tx.token) {
        return Err(MetaFwdError::ZeroAddress { field: "token" });
    }
    if meta_tx.amount.is_zero() {
        return Err(MetaFwdError::InvalidAmount);
    }
    if meta_tx.deadline == 0 {
        return Err(MetaFwdError::ExpiredDeadline);
    }
    Ok(())
}

/// Check that a deadline has not passed.
pub fn validate_deadline(deadline: u64) -> Result<()> {
    if current_timestamp() > deadline {
        return Err(MetaFwdError::ExpiredDeadline);
    }
    Ok(())
}

/// Check that batch nonces are sequential from `expected_start`.
pub fn validate_batch_nonces(batch: &[BatchRequest], expected_start: u64) -> Result<()> {
    for (i, req) in batch.iter().enumerate() {
        let expected = expected_start + i as u64;
        if req.meta_tx.nonce != expected {
            return Err(MetaFwdError::InvalidNonce {
                index: i,
                expected,
                actual: req.meta_tx.nonce,
            });
        }
    }
    Ok(())
}

/// Check that every request in a batch is from the same sender. An empty
/// batch is valid.
pub fn validate_batch_from_same_user(batch: &[BatchRequest]) -> Result<()> {
    let Some(first) = batch.first() else {
        return Ok(());
    };
    let expected = first.meta_tx.from;
    for (i, req) in batch.iter().enumerate() {
        if req.meta_tx.from != expected {
            return Err(MetaFwdError::MixedBatchSenders {
                index: i,
                expected,
                actual: req.meta_tx.from,
            });
        }
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MetaFwdError::Cancelled);
    }
    Ok(())
}

/// Sign one meta transaction into a batch element.
pub fn create_batch_request(
    meta_tx: MetaTx,
    user_key: &SigningKey,
    domain_separator: &B256,
) -> Result<BatchRequest> {
    let signature = sign_meta_tx(&meta_tx, user_key, domain_separator)?;
    Ok(BatchRequest { meta_tx, signature })
}

/// Sign every meta transaction with the same key.
///
/// Cancellation is polled before each element; output order matches input
/// order.
pub fn create_batch_from_single_user(
    cancel: &CancellationToken,
    meta_txs: Vec<MetaTx>,
    user_key: &SigningKey,
    domain_separator: &B256,
) -> Result<BatchRequestList> {
    let mut batch = Vec::with_capacity(meta_txs.len());
    for (i, meta_tx) in meta_txs.into_iter().enumerate() {
        check_cancelled(cancel)?;
        let req = create_batch_request(meta_tx, user_key, domain_separator)
            .map_err(|e| e.at_index(i))?;
        batch.push(req);
    }
    Ok(batch)
}

/// Zip meta transactions with their signers and sign each pair.
pub fn create_batch_from_meta_txs(
    cancel: &CancellationToken,
    meta_txs: Vec<MetaTx>,
    user_keys: &[SigningKey],
    domain_separator: &B256,
) -> Result<BatchRequestList> {
    if meta_txs.len() != user_keys.len() {
        return Err(MetaFwdError::LengthMismatch {
            left: meta_txs.len(),
            right: user_keys.len(),
        });
    }

    let mut batch = Vec::with_capacity(meta_txs.len());
    for (i, (meta_tx, key)) in meta_txs.into_iter().zip(user_keys).enumerate() {
        check_cancelled(cancel)?;
        let req =
            create_batch_request(meta_tx, key, domain_separator).map_err(|e| e.at_index(i))?;
        batch.push(req);
    }
    Ok(batch)
}

/// Verify every signature in a batch, returning one boolean per element.
pub fn verify_batch_requests(
    cancel: &CancellationToken,
    batch: &[BatchRequest],
    domain_separator: &B256,
) -> Result<Vec<bool>> {
    let mut results = Vec::with_capacity(batch.len());
    for (i, req) in batch.iter().enumerate() {
        check_cancelled(cancel)?;
        let ok = verify_meta_tx(&req.meta_tx, &req.signature, domain_separator)
            .map_err(|e| e.at_index(i))?;
        results.push(ok);
    }
    Ok(results)
}
