//! Ethereum JSON-RPC gateway over HTTP
//!
//! Signing is delegated to the node/wallet behind the endpoint
//! (`eth_sendTransaction`); this client never holds keys.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ChainConfig;
use crate::gateway::{
    BlockTag, ChainGateway, ChainId, ContractCall, GatewayError, TxReceipt, TxRequest,
};

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl<T> RpcResponse<T> {
    /// Error object wins; a missing result decodes as `None`
    fn into_result(self) -> Result<Option<T>, GatewayError> {
        if let Some(err) = self.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self.result)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

/// JSON-RPC client keyed by chain id
pub struct JsonRpcGateway {
    client: reqwest::Client,
    endpoints: HashMap<ChainId, String>,
    next_id: AtomicU64,
}

impl JsonRpcGateway {
    pub fn new(chains: &[ChainConfig], timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoints = chains
            .iter()
            .map(|c| (c.chain_id, c.rpc_url.clone()))
            .collect();

        Ok(Self {
            client,
            endpoints,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        chain: ChainId,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, GatewayError> {
        let url = self
            .endpoints
            .get(&chain)
            .ok_or(GatewayError::UnsupportedChain(chain))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::trace!("rpc {} -> chain {}: {}", method, chain, body);

        let response: RpcResponse<T> = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }

    async fn request_required<T: DeserializeOwned>(
        &self,
        chain: ChainId,
        method: &str,
        params: Value,
    ) -> Result<T, GatewayError> {
        self.request(chain, method, params)
            .await?
            .ok_or_else(|| GatewayError::Decode(format!("{} returned no result", method)))
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(s: &str) -> Result<U256, GatewayError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| GatewayError::Decode(format!("quantity without 0x prefix: {}", s)))?;
    if digits.is_empty() {
        return Err(GatewayError::Decode("empty quantity".to_string()));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| GatewayError::Decode(format!("bad quantity {}: {}", s, e)))
}

fn parse_u64_quantity(s: &str) -> Result<u64, GatewayError> {
    let value = parse_quantity(s)?;
    u64::try_from(value).map_err(|_| GatewayError::Decode(format!("quantity exceeds u64: {}", s)))
}

fn parse_data(s: &str) -> Result<Bytes, GatewayError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Decode(format!("bad hex data: {}", e)))
}

fn parse_receipt(raw: RawReceipt) -> Result<TxReceipt, GatewayError> {
    let tx_hash = TxHash::from_str(&raw.transaction_hash)
        .map_err(|e| GatewayError::Decode(format!("bad transaction hash: {}", e)))?;

    // Pre-Byzantium receipts carry no status; treat them as successful
    let success = match raw.status.as_deref() {
        Some(status) => !parse_quantity(status)?.is_zero(),
        None => true,
    };

    let block_number = raw
        .block_number
        .as_deref()
        .map(parse_u64_quantity)
        .transpose()?;

    Ok(TxReceipt {
        tx_hash,
        success,
        block_number,
    })
}

fn hex_data(data: &Bytes) -> String {
    format!("0x{}", hex::encode(data))
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    fn supports(&self, chain: ChainId) -> bool {
        self.endpoints.contains_key(&chain)
    }

    async fn block_number(&self, chain: ChainId) -> Result<u64, GatewayError> {
        let raw: String = self.request_required(chain, "eth_blockNumber", json!([])).await?;
        parse_u64_quantity(&raw)
    }

    async fn call(
        &self,
        chain: ChainId,
        call: &ContractCall,
        block: BlockTag,
    ) -> Result<Bytes, GatewayError> {
        let params = json!([
            { "to": call.to.to_string(), "data": hex_data(&call.data) },
            block.to_rpc_param(),
        ]);
        let raw: String = self.request_required(chain, "eth_call", params).await?;
        parse_data(&raw)
    }

    async fn native_balance(
        &self,
        chain: ChainId,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, GatewayError> {
        let params = json!([account.to_string(), block.to_rpc_param()]);
        let raw: String = self.request_required(chain, "eth_getBalance", params).await?;
        parse_quantity(&raw)
    }

    async fn submit(&self, chain: ChainId, tx: &TxRequest) -> Result<TxHash, GatewayError> {
        let params = json!([{
            "from": tx.from.to_string(),
            "to": tx.to.to_string(),
            "data": hex_data(&tx.data),
            "value": format!("0x{:x}", tx.value),
        }]);
        let raw: String = self.request_required(chain, "eth_sendTransaction", params).await?;
        TxHash::from_str(&raw)
            .map_err(|e| GatewayError::Decode(format!("bad transaction hash: {}", e)))
    }

    async fn receipt(&self, chain: ChainId, tx: TxHash) -> Result<Option<TxReceipt>, GatewayError> {
        let params = json!([tx.to_string()]);
        let raw: Option<RawReceipt> = self
            .request(chain, "eth_getTransactionReceipt", params)
            .await?;
        raw.map(parse_receipt).transpose()
    }
}
