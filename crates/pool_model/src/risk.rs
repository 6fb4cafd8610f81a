//! Collateral ratio, health factor and risk tiering
//!
//! Two tiering formulas exist for lending views. `RiskPolicy::CollateralRatio`
//! is the canonical one; `RiskPolicy::HealthFactor` is kept as an explicit,
//! separately selected alternative and is never blended with the first.
//!
//! Every function here is total: arithmetic overflow is treated as an
//! unbounded ratio rather than a panic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Health factor reported when nothing is borrowed
pub const NO_DEBT_HEALTH_FACTOR: Decimal = Decimal::ONE_HUNDRED;

/// Collateral ratio (percent) at which a loan becomes liquidatable
pub fn default_liquidation_ratio() -> Decimal {
    Decimal::new(130, 0)
}

/// Collateral ratio (percent) from which a loan is considered safe
pub fn default_safe_ratio() -> Decimal {
    Decimal::new(150, 0)
}

/// Liquidation threshold used by the health-factor formula (85%)
pub fn default_liquidation_threshold() -> Decimal {
    Decimal::new(85, 2)
}

/// Discrete risk tier, used for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Safe,
    Warning,
    Danger,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTier::Safe => "safe",
            RiskTier::Warning => "warning",
            RiskTier::Danger => "danger",
            RiskTier::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Tiering formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskPolicy {
    /// ratio >= safe -> Safe; liquidation <= ratio < safe -> Warning;
    /// ratio < liquidation -> Danger. Never yields Critical.
    /// Health factor = ratio / liquidation_ratio.
    CollateralRatio {
        #[serde(with = "rust_decimal::serde::str", default = "default_liquidation_ratio")]
        liquidation_ratio: Decimal,
        #[serde(with = "rust_decimal::serde::str", default = "default_safe_ratio")]
        safe_ratio: Decimal,
    },
    /// Health factor = collateral * threshold / borrowed;
    /// HF >= 1.5 Safe, >= 1.2 Warning, >= 1.0 Danger, else Critical.
    HealthFactor {
        #[serde(with = "rust_decimal::serde::str", default = "default_liquidation_threshold")]
        liquidation_threshold: Decimal,
    },
}

impl Default for RiskPolicy {
    fn default() -> Self {
        RiskPolicy::CollateralRatio {
            liquidation_ratio: default_liquidation_ratio(),
            safe_ratio: default_safe_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskInputError {
    #[error("collateral value must be non-negative, got {0}")]
    NegativeCollateral(Decimal),
    #[error("borrowed value must be non-negative, got {0}")]
    NegativeBorrowed(Decimal),
}

/// Validated evaluator inputs (both non-negative, same unit)
///
/// `Default` is zero collateral and zero debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiskInputs {
    collateral: Decimal,
    borrowed: Decimal,
}

impl RiskInputs {
    pub fn new(collateral: Decimal, borrowed: Decimal) -> Result<Self, RiskInputError> {
        if collateral.is_sign_negative() && !collateral.is_zero() {
            return Err(RiskInputError::NegativeCollateral(collateral));
        }
        if borrowed.is_sign_negative() && !borrowed.is_zero() {
            return Err(RiskInputError::NegativeBorrowed(borrowed));
        }
        Ok(Self { collateral, borrowed })
    }

    pub fn collateral(&self) -> Decimal {
        self.collateral
    }

    pub fn borrowed(&self) -> Decimal {
        self.borrowed
    }
}

/// Derived risk view of a (collateral, borrowed) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskSnapshot {
    #[serde(with = "rust_decimal::serde::str")]
    pub collateral_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub borrowed_value: Decimal,
    /// collateral / borrowed * 100; `None` when nothing is borrowed
    #[serde(with = "rust_decimal::serde::str_option")]
    pub collateral_ratio: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub health_factor: Decimal,
    pub tier: RiskTier,
}

/// Evaluate a risk snapshot under `policy`
pub fn evaluate(inputs: RiskInputs, policy: &RiskPolicy) -> RiskSnapshot {
    let collateral = inputs.collateral;
    let borrowed = inputs.borrowed;

    if borrowed.is_zero() {
        return RiskSnapshot {
            collateral_value: collateral,
            borrowed_value: borrowed,
            collateral_ratio: None,
            health_factor: NO_DEBT_HEALTH_FACTOR,
            tier: RiskTier::Safe,
        };
    }

    let ratio = collateral_ratio(collateral, borrowed);

    let (health_factor, tier) = match *policy {
        RiskPolicy::CollateralRatio {
            liquidation_ratio,
            safe_ratio,
        } => {
            let hf = if liquidation_ratio.is_zero() {
                Decimal::MAX
            } else {
                ratio.checked_div(liquidation_ratio).unwrap_or(Decimal::MAX)
            };
            (hf, tier_by_ratio(ratio, liquidation_ratio, safe_ratio))
        }
        RiskPolicy::HealthFactor {
            liquidation_threshold,
        } => {
            let hf = collateral
                .checked_mul(liquidation_threshold)
                .and_then(|weighted| weighted.checked_div(borrowed))
                .unwrap_or(Decimal::MAX);
            (hf, tier_by_health_factor(hf))
        }
    };

    RiskSnapshot {
        collateral_value: collateral,
        borrowed_value: borrowed,
        collateral_ratio: Some(ratio),
        health_factor,
        tier,
    }
}

/// collateral / borrowed * 100, saturating at `Decimal::MAX`
pub fn collateral_ratio(collateral: Decimal, borrowed: Decimal) -> Decimal {
    if borrowed.is_zero() {
        return Decimal::MAX;
    }
    collateral
        .checked_div(borrowed)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX)
}

/// Lower bounds are inclusive: ratio == liquidation is Warning, ratio == safe is Safe
pub fn tier_by_ratio(ratio: Decimal, liquidation_ratio: Decimal, safe_ratio: Decimal) -> RiskTier {
    if ratio >= safe_ratio {
        RiskTier::Safe
    } else if ratio >= liquidation_ratio {
        RiskTier::Warning
    } else {
        RiskTier::Danger
    }
}

pub fn tier_by_health_factor(hf: Decimal) -> RiskTier {
    if hf >= Decimal::new(15, 1) {
        RiskTier::Safe
    } else if hf >= Decimal::new(12, 1) {
        RiskTier::Warning
    } else if hf >= Decimal::ONE {
        RiskTier::Danger
    } else {
        RiskTier::Critical
    }
}
