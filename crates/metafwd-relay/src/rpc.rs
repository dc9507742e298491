//! JSON-RPC access to an Ethereum execution node.
//!
//! Methods used:
//! - eth_gasPrice
//! - eth_getTransactionCount (pending)
//! - eth_estimateGas
//! - eth_chainId
//! - eth_sendRawTransaction
//! - eth_call

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use metafwd_types::{bytes_to_hex, hex_to_bytes, MetaFwdError, Result, RpcStage};
use serde_json::{json, Value};

/// Parameters of a contract call, used for `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

/// The node operations the relay driver needs.
///
/// Implementations must not retry; failures are surfaced to the caller with
/// the stage they occurred in.
#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn gas_price(&self) -> Result<U256>;
    async fn pending_nonce(&self, address: &Address) -> Result<u64>;
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64>;
    async fn chain_id(&self) -> Result<u64>;
    async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256>;
    async fn call(&self, call: &CallRequest) -> Result<Vec<u8>>;
}

/// JSON-RPC client for an Ethereum node.
pub struct HttpRpcClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, stage: RpcStage, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| rpc_error(stage, format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(rpc_error(
                stage,
                format!("node returned status {}", resp.status()),
            ));
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| rpc_error(stage, format!("failed to parse response: {e}")))?;

        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32_000);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(rpc_error(stage, format!("node error {code}: {message}")));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| rpc_error(stage, "response carries no result".to_string()))
    }

    fn call_object(call: &CallRequest) -> Value {
        let mut object = json!({
            "to": bytes_to_hex(call.to.as_slice()),
            "value": format!("{:#x}", call.value),
            "data": bytes_to_hex(&call.data),
        });
        if let Some(from) = call.from {
            object["from"] = Value::String(bytes_to_hex(from.as_slice()));
        }
        object
    }
}

fn rpc_error(stage: RpcStage, message: String) -> MetaFwdError {
    MetaFwdError::RpcFailure { stage, message }
}

/// Parse an eth_* hex quantity ("0x0" style, `0x` meaning zero).
fn quantity(stage: RpcStage, value: &Value) -> Result<U256> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| rpc_error(stage, "expected a hex quantity".to_string()))?;
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if stripped.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(stripped, 16)
        .map_err(|e| rpc_error(stage, format!("malformed quantity {hex_str}: {e}")))
}

fn quantity_u64(stage: RpcStage, value: &Value) -> Result<u64> {
    let wide = quantity(stage, value)?;
    if wide > U256::from(u64::MAX) {
        return Err(rpc_error(stage, format!("quantity {wide} exceeds u64")));
    }
    Ok(wide.as_limbs()[0])
}

#[async_trait]
impl EthRpc for HttpRpcClient {
    async fn gas_price(&self) -> Result<U256> {
        let result = self
            .request(RpcStage::GasPrice, "eth_gasPrice", json!([]))
            .await?;
        quantity(RpcStage::GasPrice, &result)
    }

    async fn pending_nonce(&self, address: &Address) -> Result<u64> {
        let result = self
            .request(
                RpcStage::PendingNonce,
                "eth_getTransactionCount",
                json!([bytes_to_hex(address.as_slice()), "pending"]),
            )
            .await?;
        quantity_u64(RpcStage::PendingNonce, &result)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        let result = self
            .request(
                RpcStage::EstimateGas,
                "eth_estimateGas",
                json!([Self::call_object(call)]),
            )
            .await?;
        quantity_u64(RpcStage::EstimateGas, &result)
    }

    async fn chain_id(&self) -> Result<u64> {
        let result = self
            .request(RpcStage::ChainId, "eth_chainId", json!([]))
            .await?;
        quantity_u64(RpcStage::ChainId, &result)
    }

    async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<B256> {
        let result = self
            .request(
                RpcStage::SendTransaction,
                "eth_sendRawTransaction",
                json!([bytes_to_hex(raw_tx)]),
            )
            .await?;
        let hex_str = result.as_str().ok_or_else(|| {
            rpc_error(RpcStage::SendTransaction, "expected a tx hash".to_string())
        })?;
        let bytes = hex_to_bytes(hex_str).map_err(|e| {
            rpc_error(RpcStage::SendTransaction, format!("malformed tx hash: {e}"))
        })?;
        if bytes.len() != 32 {
            return Err(rpc_error(
                RpcStage::SendTransaction,
                format!("expected a 32-byte tx hash, got {} bytes", bytes.len()),
            ));
        }
        Ok(B256::from_slice(&bytes))
    }

    async fn call(&self, call: &CallRequest) -> Result<Vec<u8>> {
        let result = self
            .request(
                RpcStage::Call,
                "eth_call",
                json!([Self::call_object(call), "latest"]),
            )
            .await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| rpc_error(RpcStage::Call, "expected return data".to_string()))?;
        hex_to_bytes(hex_str)
            .map_err(|e| rpc_error(RpcStage::Call, format!("malformed return data: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_parse_eth_hex_conventions() {
        assert_eq!(
            quantity(RpcStage::GasPrice, &json!("0x3b9aca00")).unwrap(),
            U256::from(1_000_000_000u64)
        );
        assert_eq!(quantity(RpcStage::GasPrice, &json!("0x")).unwrap(), U256::ZERO);
        assert!(quantity(RpcStage::GasPrice, &json!(42)).is_err());
        assert!(quantity_u64(
            RpcStage::GasPrice,
            &json!("0x10000000000000000000000000000000000")
        )
        .is_err());
    }

    #[test]
    fn call_objects_include_from_only_when_present() {
        let call = CallRequest {
            from: None,
            to: Address::ZERO,
            value: U256::ZERO,
            data: vec![0xa9, 0x05, 0x9c, 0xbb],
        };
        let object = HttpRpcClient::call_object(&call);
        assert!(object.get("from").is_none());
        assert_eq!(object["value"], "0x0");
        assert_eq!(object["data"], "0xa9059cbb");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = HttpRpcClient::new("http://localhost:8545/", None);
        assert_eq!(client.url, "http://localhost:8545");
    }
}
