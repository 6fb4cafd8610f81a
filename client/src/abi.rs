//! Contract ABI for the calls the client makes
//!
//! ERC-20 calls are typed through `sol!`. Pool methods are configured per
//! pool as signature strings, so they are parsed at runtime and encoded
//! dynamically.

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::Function;
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{sol, sol_data, SolCall, SolType};
use thiserror::Error;

use crate::gateway::GatewayError;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("invalid method signature {signature:?}: {reason}")]
    Signature { signature: String, reason: String },

    #[error("cannot encode arguments for {signature:?}: {reason}")]
    Encode { signature: String, reason: String },
}

/// Parse a configured signature such as `deposit(uint256)`
pub fn parse_method(signature: &str) -> Result<Function, AbiError> {
    Function::parse(signature).map_err(|e| AbiError::Signature {
        signature: signature.to_string(),
        reason: e.to_string(),
    })
}

/// selector || encoded arguments for a configured pool method
pub fn encode_method(signature: &str, args: &[DynSolValue]) -> Result<Bytes, AbiError> {
    let function = parse_method(signature)?;
    let data = function
        .abi_encode_input(args)
        .map_err(|e| AbiError::Encode {
            signature: signature.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Bytes::from(data))
}

/// `uint256` argument for a pool method
pub fn uint_arg(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

/// Decode the return data of a typed call
pub fn decode_returns<C: SolCall>(data: &[u8]) -> Result<C::Return, GatewayError> {
    C::abi_decode_returns(data, false).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Decode a configured method's single `uint256` return
pub fn decode_u256(data: &[u8]) -> Result<U256, GatewayError> {
    <sol_data::Uint<256> as SolType>::abi_decode(data, false)
        .map_err(|e| GatewayError::Decode(e.to_string()))
}
