//! Balance Reader
//!
//! Reads one account's balance of a native coin or ERC-20 token. Reads never
//! raise: every failure comes back as a tagged `BalanceReading::Failed`, and
//! `or_zero()` gives the "degrade to zero" value used for display.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::abi::{self, IERC20};
use crate::catalog::AssetSource;
use crate::gateway::{BlockTag, ChainGateway, ChainId, ContractCall};

/// Why a balance could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceFailure {
    /// No wallet connected
    MissingAccount,
    /// Not `0x` + 40 hex digits
    MalformedAccount(String),
    UnsupportedChain(ChainId),
    /// Network error, revert, or undecodable return data
    ReadFailed(String),
}

impl std::fmt::Display for BalanceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceFailure::MissingAccount => f.write_str("no account connected"),
            BalanceFailure::MalformedAccount(a) => write!(f, "malformed account address {:?}", a),
            BalanceFailure::UnsupportedChain(c) => write!(f, "unsupported chain {}", c),
            BalanceFailure::ReadFailed(e) => write!(f, "read failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceReading {
    Ok(U256),
    Failed(BalanceFailure),
}

impl BalanceReading {
    /// Display value: failures read as zero
    pub fn or_zero(&self) -> U256 {
        match self {
            BalanceReading::Ok(v) => *v,
            BalanceReading::Failed(_) => U256::ZERO,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, BalanceReading::Ok(_))
    }

    pub fn failure(&self) -> Option<&BalanceFailure> {
        match self {
            BalanceReading::Ok(_) => None,
            BalanceReading::Failed(f) => Some(f),
        }
    }
}

/// Validate a wallet-supplied account address
pub fn parse_account(account: Option<&str>) -> Result<Address, BalanceFailure> {
    let raw = account.map(str::trim).filter(|a| !a.is_empty());
    let raw = raw.ok_or(BalanceFailure::MissingAccount)?;

    let malformed = || BalanceFailure::MalformedAccount(raw.to_string());

    let digits = raw.strip_prefix("0x").ok_or_else(malformed)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed());
    }

    raw.parse::<Address>().map_err(|_| malformed())
}

/// Read `account`'s balance of `source` on `chain`
pub async fn read_balance<G>(
    gateway: &G,
    source: &AssetSource,
    account: Option<&str>,
    chain: ChainId,
    block: BlockTag,
) -> BalanceReading
where
    G: ChainGateway + ?Sized,
{
    match parse_account(account) {
        Ok(address) => read_balance_of(gateway, source, address, chain, block).await,
        Err(failure) => {
            log::debug!("Balance read skipped: {}", failure);
            BalanceReading::Failed(failure)
        }
    }
}

/// Read the balance of an already validated address
pub async fn read_balance_of<G>(
    gateway: &G,
    source: &AssetSource,
    account: Address,
    chain: ChainId,
    block: BlockTag,
) -> BalanceReading
where
    G: ChainGateway + ?Sized,
{
    if !gateway.supports(chain) {
        log::debug!("Balance read skipped: unsupported chain {}", chain);
        return BalanceReading::Failed(BalanceFailure::UnsupportedChain(chain));
    }

    let result = match source {
        AssetSource::Native => gateway.native_balance(chain, account, block).await,
        AssetSource::Token { address } => {
            let call = ContractCall {
                to: *address,
                data: IERC20::balanceOfCall { owner: account }.abi_encode().into(),
            };
            match gateway.call(chain, &call, block).await {
                Ok(data) => abi::decode_returns::<IERC20::balanceOfCall>(&data).map(|r| r._0),
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(balance) => BalanceReading::Ok(balance),
        Err(e) => {
            log::warn!("Balance read for {} on chain {} failed: {}", account, chain, e);
            BalanceReading::Failed(BalanceFailure::ReadFailed(e.to_string()))
        }
    }
}

/// Legacy display read: the raw balance, or zero on any failure
pub async fn balance_or_zero<G>(
    gateway: &G,
    source: &AssetSource,
    account: Option<&str>,
    chain: ChainId,
) -> U256
where
    G: ChainGateway + ?Sized,
{
    read_balance(gateway, source, account, chain, BlockTag::Latest)
        .await
        .or_zero()
}
