//! Chain read/write gateway
//!
//! The client never talks to a node directly; everything goes through a
//! `ChainGateway`. Connection pooling, signing and gas estimation belong to
//! the implementation behind the trait.

use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::abi::AbiError;

/// EIP-155 chain identifier
pub type ChainId = u64;

/// Block a read is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    /// JSON-RPC block parameter
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(n) => format!("{:#x}", n),
        }
    }
}

impl std::fmt::Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Number(n) => write!(f, "#{}", n),
        }
    }
}

/// Read-only contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
}

/// Transaction to be signed and broadcast by the gateway's wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    /// Native value attached (native-asset deposits)
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// `status == 1`
    pub success: bool,
    pub block_number: Option<u64>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("chain {0} is not served by this gateway")]
    UnsupportedChain(ChainId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error(transparent)]
    Abi(#[from] AbiError),
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Whether reads and writes for `chain` can be served
    fn supports(&self, chain: ChainId) -> bool;

    async fn block_number(&self, chain: ChainId) -> Result<u64, GatewayError>;

    /// readValue(contract, selector, args, chain)
    async fn call(
        &self,
        chain: ChainId,
        call: &ContractCall,
        block: BlockTag,
    ) -> Result<Bytes, GatewayError>;

    async fn native_balance(
        &self,
        chain: ChainId,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, GatewayError>;

    /// submitTransaction(contract, selector, args, chain)
    async fn submit(&self, chain: ChainId, tx: &TxRequest) -> Result<TxHash, GatewayError>;

    /// `None` while the transaction is not yet mined
    async fn receipt(&self, chain: ChainId, tx: TxHash) -> Result<Option<TxReceipt>, GatewayError>;
}
