//! Transaction builder for pool actions

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use pool_model::TransactionKind;
use thiserror::Error;

use crate::abi::{self, AbiError, IERC20};
use crate::catalog::{AssetSource, Pool};
use crate::gateway::{ContractCall, TxRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{0} is not a pool method; use build_approve_transaction")]
    NotPoolMethod(TransactionKind),

    #[error(transparent)]
    Abi(#[from] AbiError),
}

/// Build the ERC-20 `approve(pool, amount)` transaction
///
/// Returns `None` for native pools, which need no allowance.
pub fn build_approve_transaction(pool: &Pool, owner: Address, amount: U256) -> Option<TxRequest> {
    let token = match pool.asset.source {
        AssetSource::Native => return None,
        AssetSource::Token { address } => address,
    };

    let call = IERC20::approveCall {
        spender: pool.pool_address,
        amount,
    };
    Some(TxRequest {
        from: owner,
        to: token,
        data: Bytes::from(call.abi_encode()),
        value: U256::ZERO,
    })
}

/// Build a deposit/withdraw/loan transaction against the pool contract
///
/// Native deposits call the payable deposit method with `amount` attached
/// as value.
pub fn build_pool_transaction(
    pool: &Pool,
    owner: Address,
    kind: TransactionKind,
    amount: U256,
) -> Result<TxRequest, BuildError> {
    let methods = &pool.methods;
    let arg = [abi::uint_arg(amount)];

    let (data, value) = match kind {
        TransactionKind::Approve => return Err(BuildError::NotPoolMethod(kind)),
        TransactionKind::Deposit if pool.asset.source.is_native() => {
            (abi::encode_method(&methods.native_deposit, &[])?, amount)
        }
        TransactionKind::Deposit => (abi::encode_method(&methods.deposit, &arg)?, U256::ZERO),
        TransactionKind::Withdraw => (abi::encode_method(&methods.withdraw, &arg)?, U256::ZERO),
        TransactionKind::Loan => (abi::encode_method(&methods.loan, &arg)?, U256::ZERO),
    };

    Ok(TxRequest {
        from: owner,
        to: pool.pool_address,
        data,
        value,
    })
}

/// `allowance(owner, pool)` read on the pool's asset token
pub fn build_allowance_call(pool: &Pool, owner: Address) -> Option<ContractCall> {
    match pool.asset.source {
        AssetSource::Native => None,
        AssetSource::Token { address } => {
            let call = IERC20::allowanceCall {
                owner,
                spender: pool.pool_address,
            };
            Some(ContractCall {
                to: address,
                data: Bytes::from(call.abi_encode()),
            })
        }
    }
}
