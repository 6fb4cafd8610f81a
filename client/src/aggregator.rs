//! Position Aggregator
//!
//! Combines raw chain reads into pool TVL and a user's pro-rata position.
//! All reads of one aggregation are pinned to a single block number so the
//! share balance, share supply and TVL describe the same chain state.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use futures::future::join_all;
use pool_model::{compute_tvl, PositionFigures};

use crate::abi::{self, IERC20};
use crate::balance::{read_balance, read_balance_of, BalanceReading};
use crate::catalog::{AssetSource, Catalog, Pool};
use crate::gateway::{BlockTag, ChainGateway, ChainId, ContractCall, GatewayError};

/// TVL breakdown of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_id: String,
    pub block: BlockTag,
    /// Idle asset balance held by the pool contract
    pub asset_balance: U256,
    pub outstanding_loans: U256,
    pub tvl: U256,
    /// Reads that failed and were counted as zero
    pub degraded: Vec<String>,
}

impl PoolStats {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// A user's position in one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub pool_id: String,
    pub user: Option<Address>,
    pub block: BlockTag,
    pub figures: PositionFigures,
    /// shares * tvl / total_shares, in asset units
    pub value: U256,
    pub stats: PoolStats,
    pub degraded: Vec<String>,
}

impl Position {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty() && self.stats.is_complete()
    }
}

pub struct PositionAggregator<'a, G: ?Sized> {
    gateway: &'a G,
}

impl<'a, G> PositionAggregator<'a, G>
where
    G: ChainGateway + ?Sized,
{
    pub fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Block every read of one aggregation is evaluated at
    pub async fn pin_block(&self, chain: ChainId) -> BlockTag {
        if !self.gateway.supports(chain) {
            return BlockTag::Latest;
        }
        match self.gateway.block_number(chain).await {
            Ok(n) => BlockTag::Number(n),
            Err(e) => {
                log::warn!("Could not pin block on chain {}, reading latest: {}", chain, e);
                BlockTag::Latest
            }
        }
    }

    /// TVL = pool asset balance + outstanding loans
    pub async fn compute_tvl(&self, pool: &Pool) -> PoolStats {
        let block = self.pin_block(pool.chain_id).await;
        self.tvl_at(pool, block).await
    }

    pub async fn tvl_at(&self, pool: &Pool, block: BlockTag) -> PoolStats {
        let mut degraded = Vec::new();

        let balance = read_balance_of(
            self.gateway,
            &pool.asset.source,
            pool.pool_address,
            pool.chain_id,
            block,
        )
        .await;
        if let BalanceReading::Failed(f) = &balance {
            degraded.push(format!("asset balance: {}", f));
        }

        let loans = self
            .read_uint(
                pool.chain_id,
                pool.pool_address,
                &pool.methods.outstanding_loans,
                &[],
                block,
            )
            .await
            .unwrap_or_else(|e| {
                degraded.push(format!("outstanding loans: {}", e));
                U256::ZERO
            });

        let asset_balance = balance.or_zero();
        let tvl = compute_tvl(asset_balance, loans);

        log::debug!(
            "Pool {} at {}: balance={} loans={} tvl={}",
            pool.id,
            block,
            asset_balance,
            loans,
            tvl
        );

        PoolStats {
            pool_id: pool.id.clone(),
            block,
            asset_balance,
            outstanding_loans: loans,
            tvl,
            degraded,
        }
    }

    /// position = user shares * TVL / total shares (0 when no shares exist)
    pub async fn compute_user_position(&self, pool: &Pool, user: Option<&str>) -> Position {
        let block = self.pin_block(pool.chain_id).await;
        let stats = self.tvl_at(pool, block).await;
        let share_token = pool.share_token();
        let mut degraded = Vec::new();

        let share_source = AssetSource::Token {
            address: share_token,
        };
        let shares = read_balance(self.gateway, &share_source, user, pool.chain_id, block).await;
        if let BalanceReading::Failed(f) = &shares {
            degraded.push(format!("user shares: {}", f));
        }

        let total_shares = self
            .read_total_supply(pool.chain_id, share_token, block)
            .await
            .unwrap_or_else(|e| {
                degraded.push(format!("total shares: {}", e));
                U256::ZERO
            });

        let figures = PositionFigures {
            shares: shares.or_zero(),
            total_shares,
            tvl: stats.tvl,
        };

        Position {
            pool_id: pool.id.clone(),
            user: crate::balance::parse_account(user).ok(),
            block,
            value: figures.value(),
            figures,
            stats,
            degraded,
        }
    }

    /// TVL of every catalog pool on `chain`, read at one block
    pub async fn pool_overview(&self, catalog: &Catalog, chain: ChainId) -> Vec<PoolStats> {
        let block = self.pin_block(chain).await;
        let reads = catalog.pools_on(chain).map(|pool| self.tvl_at(pool, block));
        join_all(reads).await
    }

    /// Configured pool method `signature(args)` returning a single uint256
    pub async fn read_uint(
        &self,
        chain: ChainId,
        to: Address,
        signature: &str,
        args: &[DynSolValue],
        block: BlockTag,
    ) -> Result<U256, GatewayError> {
        let data = abi::encode_method(signature, args)?;
        let data = self.call_at(chain, to, data, block).await?;
        abi::decode_u256(&data)
    }

    async fn read_total_supply(
        &self,
        chain: ChainId,
        token: Address,
        block: BlockTag,
    ) -> Result<U256, GatewayError> {
        let data: Bytes = IERC20::totalSupplyCall {}.abi_encode().into();
        let data = self.call_at(chain, token, data, block).await?;
        abi::decode_returns::<IERC20::totalSupplyCall>(&data).map(|r| r._0)
    }

    async fn call_at(
        &self,
        chain: ChainId,
        to: Address,
        data: Bytes,
        block: BlockTag,
    ) -> Result<Bytes, GatewayError> {
        if !self.gateway.supports(chain) {
            return Err(GatewayError::UnsupportedChain(chain));
        }
        self.gateway.call(chain, &ContractCall { to, data }, block).await
    }
}
