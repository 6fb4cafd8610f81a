//! Loan health for a pool position
//!
//! Collateral is the user's pool position; debt is the pool's reported
//! borrow balance for the user. Both are read at the same block and priced
//! with the pool's display price before evaluation.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;
use pool_model::{evaluate, to_decimal, RiskInputs, RiskPolicy, RiskSnapshot};
use rust_decimal::Decimal;

use crate::aggregator::{Position, PositionAggregator};
use crate::catalog::Pool;
use crate::gateway::ChainGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanHealth {
    pub position: Position,
    /// Raw borrowed amount in asset units
    pub borrowed_raw: U256,
    /// Display unit: USD when the pool has a price, else asset units
    pub collateral_value: Decimal,
    pub borrowed_value: Decimal,
    pub snapshot: RiskSnapshot,
    pub degraded: Vec<String>,
}

/// Value raw asset units in the pool's display unit
///
/// Saturates to `Decimal::MAX` when the value is not representable.
pub fn display_value(pool: &Pool, raw: U256) -> Decimal {
    checked_display_value(pool, raw).unwrap_or(Decimal::MAX)
}

/// `None` when the amount or its priced value overflows `Decimal`
pub fn checked_display_value(pool: &Pool, raw: U256) -> Option<Decimal> {
    let units = match to_decimal(raw, pool.asset.decimals) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Amount {} for pool {} not representable: {}", raw, pool.id, e);
            return None;
        }
    };
    match pool.usd_price {
        Some(price) => units.checked_mul(price),
        None => Some(units),
    }
}

pub async fn loan_health<G>(
    gateway: &G,
    pool: &Pool,
    user: Option<&str>,
    policy: &RiskPolicy,
) -> LoanHealth
where
    G: ChainGateway + ?Sized,
{
    let aggregator = PositionAggregator::new(gateway);
    let position = aggregator.compute_user_position(pool, user).await;
    let mut degraded = Vec::new();

    let borrowed_raw = match position.user {
        Some(user) => aggregator
            .read_uint(
                pool.chain_id,
                pool.pool_address,
                &pool.methods.borrow_balance,
                &[DynSolValue::Address(user)],
                position.block,
            )
            .await
            .unwrap_or_else(|e| {
                degraded.push(format!("borrow balance: {}", e));
                U256::ZERO
            }),
        None => {
            degraded.push("borrow balance: no valid account".to_string());
            U256::ZERO
        }
    };

    let mut valued = |what: &str, raw: U256| {
        checked_display_value(pool, raw).unwrap_or_else(|| {
            degraded.push(format!("{} value: {} not representable, saturated", what, raw));
            Decimal::MAX
        })
    };
    let collateral_value = valued("collateral", position.value);
    let borrowed_value = valued("borrowed", borrowed_raw);

    let inputs = RiskInputs::new(collateral_value, borrowed_value).unwrap_or_else(|e| {
        degraded.push(format!("risk inputs: {}", e));
        RiskInputs::default()
    });
    let snapshot = evaluate(inputs, policy);

    LoanHealth {
        position,
        borrowed_raw,
        collateral_value,
        borrowed_value,
        snapshot,
        degraded,
    }
}
