//! Liquidity pool client
//!
//! Reads pool and position figures from chain, evaluates loan risk for
//! display, and drives approve/deposit/withdraw/loan transactions through a
//! `ChainGateway`.

pub mod abi;
pub mod aggregator;
pub mod balance;
pub mod catalog;
pub mod config;
pub mod confirmations;
pub mod gateway;
pub mod health;
pub mod orchestrator;
pub mod rpc;
pub mod tx_builder;

pub use aggregator::{PoolStats, Position, PositionAggregator};
pub use balance::{balance_or_zero, read_balance, BalanceFailure, BalanceReading};
pub use catalog::{Asset, AssetSource, Catalog, CatalogError, Pool};
pub use config::Config;
pub use confirmations::{BackoffPolicy, ConfirmationStatus, ConfirmationTracker};
pub use gateway::{
    BlockTag, ChainGateway, ChainId, ContractCall, GatewayError, TxReceipt, TxRequest,
};
pub use orchestrator::{FlowOutcome, Orchestrator, OrchestratorError};
pub use rpc::JsonRpcGateway;
