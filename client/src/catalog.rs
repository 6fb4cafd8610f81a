//! Static pool catalog
//!
//! Loaded once from TOML and never mutated at runtime.

use std::path::Path;
use std::str::FromStr;

use alloy_primitives::Address;
use pool_model::MAX_DECIMALS;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abi::{self, AbiError};
use crate::gateway::ChainId;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("duplicate pool id {0:?}")]
    DuplicateId(String),

    #[error("pool {pool:?} is on chain {pool_chain} but its asset is on chain {asset_chain}")]
    ChainMismatch {
        pool: String,
        pool_chain: ChainId,
        asset_chain: ChainId,
    },

    #[error("pool {pool:?} asset has {decimals} decimals (max 77)")]
    UnsupportedDecimals { pool: String, decimals: u8 },

    #[error("unknown pool {0:?}")]
    UnknownPool(String),

    #[error("pool {pool:?}: {source}")]
    Method {
        pool: String,
        #[source]
        source: AbiError,
    },
}

/// Where an asset's balance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AssetSource {
    /// Chain's native coin
    Native,
    /// ERC-20 token contract
    Token { address: Address },
}

impl AssetSource {
    pub fn is_native(&self) -> bool {
        matches!(self, AssetSource::Native)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub chain_id: ChainId,
    pub decimals: u8,
    pub source: AssetSource,
}

/// Contract method signatures a pool exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolMethods {
    pub deposit: String,
    /// Payable deposit used for native pools
    pub native_deposit: String,
    pub withdraw: String,
    pub loan: String,
    pub outstanding_loans: String,
    pub borrow_balance: String,
}

impl PoolMethods {
    fn signatures(&self) -> [&str; 6] {
        [
            &self.deposit,
            &self.native_deposit,
            &self.withdraw,
            &self.loan,
            &self.outstanding_loans,
            &self.borrow_balance,
        ]
    }
}

impl Default for PoolMethods {
    fn default() -> Self {
        Self {
            deposit: "deposit(uint256)".to_string(),
            native_deposit: "deposit()".to_string(),
            withdraw: "withdraw(uint256)".to_string(),
            loan: "borrow(uint256)".to_string(),
            outstanding_loans: "totalBorrows()".to_string(),
            borrow_balance: "borrowBalanceOf(address)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub chain_id: ChainId,
    pub display_name: String,
    /// Annual yield in percent, display only
    #[serde(with = "rust_decimal::serde::str")]
    pub annual_yield: Decimal,
    /// Pool contract: holds idle liquidity, receives deposits
    pub pool_address: Address,
    /// Share token; the pool contract itself when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<Address>,
    /// Asset price in USD for dollar display
    #[serde(
        default,
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub usd_price: Option<Decimal>,
    pub asset: Asset,
    #[serde(default)]
    pub methods: PoolMethods,
}

impl Pool {
    pub fn share_token(&self) -> Address {
        self.share_token.unwrap_or(self.pool_address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub pools: Vec<Pool>,
}

impl Catalog {
    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str(&text)?;
        log::debug!("Loaded {} pools from {}", catalog.pools.len(), path.display());
        Ok(catalog)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Unique ids, asset on the pool's chain, representable decimals and
    /// parseable method signatures
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.id.as_str()) {
                return Err(CatalogError::DuplicateId(pool.id.clone()));
            }
            if pool.asset.chain_id != pool.chain_id {
                return Err(CatalogError::ChainMismatch {
                    pool: pool.id.clone(),
                    pool_chain: pool.chain_id,
                    asset_chain: pool.asset.chain_id,
                });
            }
            if pool.asset.decimals > MAX_DECIMALS {
                return Err(CatalogError::UnsupportedDecimals {
                    pool: pool.id.clone(),
                    decimals: pool.asset.decimals,
                });
            }
            for signature in pool.methods.signatures() {
                abi::parse_method(signature).map_err(|source| CatalogError::Method {
                    pool: pool.id.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Pool, CatalogError> {
        self.pools
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CatalogError::UnknownPool(id.to_string()))
    }

    pub fn pools_on(&self, chain: ChainId) -> impl Iterator<Item = &Pool> {
        self.pools.iter().filter(move |p| p.chain_id == chain)
    }

    /// Two pools on a local development chain
    pub fn sample_local() -> Self {
        let chain_id = 31337;
        let addr = |s: &str| Address::from_str(s).unwrap_or(Address::ZERO);

        Self {
            pools: vec![
                Pool {
                    id: "usdc".to_string(),
                    chain_id,
                    display_name: "USDC Lending Pool".to_string(),
                    annual_yield: Decimal::new(45, 1),
                    asset: Asset {
                        id: "usdc".to_string(),
                        symbol: "USDC".to_string(),
                        chain_id,
                        decimals: 6,
                        source: AssetSource::Token {
                            address: addr("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
                        },
                    },
                    pool_address: addr("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
                    share_token: None,
                    usd_price: Some(Decimal::ONE),
                    methods: PoolMethods::default(),
                },
                Pool {
                    id: "eth".to_string(),
                    chain_id,
                    display_name: "ETH Lending Pool".to_string(),
                    annual_yield: Decimal::new(32, 1),
                    asset: Asset {
                        id: "eth".to_string(),
                        symbol: "ETH".to_string(),
                        chain_id,
                        decimals: 18,
                        source: AssetSource::Native,
                    },
                    pool_address: addr("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
                    share_token: None,
                    usd_price: None,
                    methods: PoolMethods::default(),
                },
            ],
        }
    }
}
