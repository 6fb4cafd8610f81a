//! TVL and pro-rata pool position math
//!
//! All quantities are raw integers in the pool asset's smallest unit. Decimal
//! formatting happens only after these functions return, so no rounding is
//! introduced before display.

use alloy_primitives::U256;

use crate::math::*;

/// Figures that feed a user's pool position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionFigures {
    /// User's share-token balance
    pub shares: U256,
    /// Total share-token supply
    pub total_shares: U256,
    /// Pool total value locked (asset units)
    pub tvl: U256,
}

impl PositionFigures {
    /// Asset-unit value of the user's shares
    pub fn value(&self) -> U256 {
        compute_user_position(self.shares, self.total_shares, self.tvl)
    }
}

/// TVL = idle asset balance held by the pool + outstanding loans
///
/// Saturates at `U256::MAX` instead of wrapping.
pub fn compute_tvl(asset_balance: U256, outstanding_loans: U256) -> U256 {
    add_u256(asset_balance, outstanding_loans)
}

/// Position = shares * tvl / total_shares, truncated toward zero
///
/// Returns 0 when `total_shares` is 0.
pub fn compute_user_position(shares: U256, total_shares: U256, tvl: U256) -> U256 {
    if total_shares.is_zero() {
        return U256::ZERO;
    }
    mul_div_floor(shares, tvl, total_shares)
}
