//! Relay driver for meta transactions.
//!
//! Wraps a signed `MetaTx` into `execute` / `executeBatch` calldata, builds
//! and signs the outer EIP-155 transaction with the relayer's key, and
//! submits it through an `EthRpc` endpoint. The driver performs no retries;
//! every failure carries the stage it occurred in.

pub mod rpc;
pub mod tx;

use alloy_primitives::{Address, B256, U256};
use k256::ecdsa::SigningKey;
use metafwd_abi::{
    decode_uint256, encode_execute, encode_execute_batch, nonces_calldata, ForwardRequestData,
};
use metafwd_crypto::address_of;
use metafwd_request::{validate_deadline, validate_meta_tx};
use metafwd_types::{
    batch_total_value, BatchRequest, MetaFwdError, MetaTx, Result, RpcStage, Signature,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::rpc::{CallRequest, EthRpc};
use crate::tx::{sign_eip155, LegacyTransaction};

pub use crate::rpc::HttpRpcClient;

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MetaFwdError::Cancelled);
    }
    Ok(())
}

/// Wrap forwarder calldata into a signed outer transaction and submit it.
async fn submit_outer_call(
    cancel: &CancellationToken,
    relayer_key: &SigningKey,
    forwarder: &Address,
    value: U256,
    data: Vec<u8>,
    rpc: &dyn EthRpc,
) -> Result<B256> {
    let relayer = address_of(relayer_key);

    check_cancelled(cancel)?;
    let gas_price = rpc.gas_price().await?;
    debug!(%gas_price, "fetched gas price");

    check_cancelled(cancel)?;
    let nonce = rpc.pending_nonce(&relayer).await?;
    debug!(nonce, %relayer, "fetched relayer nonce");

    check_cancelled(cancel)?;
    let estimate_call = CallRequest {
        from: Some(relayer),
        to: *forwarder,
        value,
        data: data.clone(),
    };
    let gas_limit = rpc.estimate_gas(&estimate_call).await?;
    debug!(gas_limit, "estimated outer gas");

    check_cancelled(cancel)?;
    let chain_id = rpc.chain_id().await?;

    let outer = LegacyTransaction {
        nonce,
        gas_price,
        gas_limit,
        to: *forwarder,
        value,
        data: data.into(),
    };
    let signed = sign_eip155(&outer, chain_id, relayer_key)?;

    check_cancelled(cancel)?;
    let tx_hash = rpc.send_raw_transaction(&signed.raw).await?;
    info!(%tx_hash, chain_id, "relayed through forwarder");
    Ok(tx_hash)
}

/// Relay a single signed meta transaction via `execute`.
pub async fn relay_meta_tx(
    cancel: &CancellationToken,
    meta_tx: &MetaTx,
    signature: &Signature,
    relayer_key: &SigningKey,
    forwarder: &Address,
    rpc: &dyn EthRpc,
) -> Result<B256> {
    validate_meta_tx(meta_tx)?;
    validate_deadline(meta_tx.deadline)?;

    let request = ForwardRequestData::from_request(&BatchRequest {
        meta_tx: meta_tx.clone(),
        signature: *signature,
    });
    let data = encode_execute(&request)?;

    submit_outer_call(cancel, relayer_key, forwarder, U256::ZERO, data, rpc).await
}

/// Relay a batch of signed meta transactions via `executeBatch`.
///
/// Failed sub-requests are skipped and their gas refunded to
/// `refund_receiver`; pass the zero address (or use
/// [`relay_meta_tx_batch_atomic`]) to make the batch all-or-nothing.
pub async fn relay_meta_tx_batch(
    cancel: &CancellationToken,
    batch: &[BatchRequest],
    refund_receiver: &Address,
    relayer_key: &SigningKey,
    forwarder: &Address,
    rpc: &dyn EthRpc,
) -> Result<B256> {
    if batch.is_empty() {
        return Err(MetaFwdError::EmptyBatch);
    }

    for (i, req) in batch.iter().enumerate() {
        check_cancelled(cancel)?;
        validate_meta_tx(&req.meta_tx).map_err(|e| e.at_index(i))?;
        validate_deadline(req.meta_tx.deadline).map_err(|e| e.at_index(i))?;
    }

    let requests: Vec<ForwardRequestData> =
        batch.iter().map(ForwardRequestData::from_request).collect();
    let data = encode_execute_batch(&requests, refund_receiver)?;
    let value = batch_total_value(batch);

    submit_outer_call(cancel, relayer_key, forwarder, value, data, rpc).await
}

/// Relay a batch atomically: any sub-request failure reverts the whole
/// batch.
pub async fn relay_meta_tx_batch_atomic(
    cancel: &CancellationToken,
    batch: &[BatchRequest],
    relayer_key: &SigningKey,
    forwarder: &Address,
    rpc: &dyn EthRpc,
) -> Result<B256> {
    relay_meta_tx_batch(cancel, batch, &Address::ZERO, relayer_key, forwarder, rpc).await
}

/// Read a user's current meta-transaction nonce from the forwarder.
pub async fn get_meta_tx_nonce(
    cancel: &CancellationToken,
    forwarder: &Address,
    user: &Address,
    rpc: &dyn EthRpc,
) -> Result<u64> {
    check_cancelled(cancel)?;

    let call = CallRequest {
        from: None,
        to: *forwarder,
        value: U256::ZERO,
        data: nonces_calldata(user),
    };
    let returned = rpc.call(&call).await?;
    let nonce = decode_uint256(&returned).ok_or_else(|| MetaFwdError::RpcFailure {
        stage: RpcStage::Call,
        message: "malformed nonces(address) return data".to_string(),
    })?;
    Ok(nonce.as_limbs()[0])
}
