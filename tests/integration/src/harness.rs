//! In-memory chain gateway for scenario tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use pool_client::abi::{self, IERC20};
use pool_client::{
    BackoffPolicy, BlockTag, Catalog, ChainGateway, ChainId, ContractCall, GatewayError, Pool,
    TxReceipt, TxRequest,
};

/// Local chain used by the sample catalog
pub const LOCAL_CHAIN: ChainId = 31337;

/// Connected account used throughout the scenarios
pub const USER: &str = "0x00000000000000000000000000000000000000aa";

pub fn user() -> Address {
    USER.parse().unwrap()
}

/// Sample token pool (USDC, 6 decimals, $1)
pub fn token_pool() -> Pool {
    Catalog::sample_local().get("usdc").unwrap().clone()
}

/// Sample native pool (ETH, 18 decimals)
pub fn native_pool() -> Pool {
    Catalog::sample_local().get("eth").unwrap().clone()
}

pub fn token_address(pool: &Pool) -> Address {
    match pool.asset.source {
        pool_client::AssetSource::Token { address } => address,
        pool_client::AssetSource::Native => panic!("pool {} is native", pool.id),
    }
}

/// Receipt polling fast enough for tests
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_attempts: 5,
    }
}

/// Whole-asset amount in raw units
pub fn units(whole: u64, decimals: u8) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}

/// How submitted transactions resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Revert,
    /// Never mined
    Pending,
}

struct MockState {
    chains: HashSet<ChainId>,
    block: u64,
    uints: HashMap<(Address, Bytes), U256>,
    natives: HashMap<Address, U256>,
    read_blocks: Vec<BlockTag>,
    fail_reads: bool,
    fail_block_number: bool,
    submit_error: Option<String>,
    submitted: Vec<TxRequest>,
    receipt_mode: ReceiptMode,
    /// Polls answered with "not yet mined" before a receipt shows up
    pending_polls: u32,
    polls: HashMap<TxHash, u32>,
}

pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(chain: ChainId) -> Self {
        Self {
            state: Mutex::new(MockState {
                chains: HashSet::from([chain]),
                block: 1,
                uints: HashMap::new(),
                natives: HashMap::new(),
                read_blocks: Vec::new(),
                fail_reads: false,
                fail_block_number: false,
                submit_error: None,
                submitted: Vec::new(),
                receipt_mode: ReceiptMode::Success,
                pending_polls: 0,
                polls: HashMap::new(),
            }),
        }
    }

    pub fn local() -> Self {
        Self::new(LOCAL_CHAIN)
    }

    pub fn set_block(&self, block: u64) {
        self.state.lock().unwrap().block = block;
    }

    /// Answer the configured method `signature(args)` on `to` with `value`
    pub fn set_uint(&self, to: Address, signature: &str, args: &[DynSolValue], value: U256) {
        let data = abi::encode_method(signature, args).unwrap();
        self.answer(to, data, value);
    }

    pub fn set_token_balance(&self, token: Address, account: Address, value: U256) {
        let call = IERC20::balanceOfCall { owner: account };
        self.answer(token, call.abi_encode().into(), value);
    }

    pub fn set_total_supply(&self, token: Address, value: U256) {
        self.answer(token, IERC20::totalSupplyCall {}.abi_encode().into(), value);
    }

    pub fn set_allowance(&self, pool: &Pool, owner: Address, value: U256) {
        let call = IERC20::allowanceCall {
            owner,
            spender: pool.pool_address,
        };
        self.answer(token_address(pool), call.abi_encode().into(), value);
    }

    fn answer(&self, to: Address, data: Bytes, value: U256) {
        self.state.lock().unwrap().uints.insert((to, data), value);
    }

    pub fn set_native(&self, account: Address, value: U256) {
        self.state.lock().unwrap().natives.insert(account, value);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_block_number(&self, fail: bool) {
        self.state.lock().unwrap().fail_block_number = fail;
    }

    pub fn fail_submissions(&self, message: Option<&str>) {
        self.state.lock().unwrap().submit_error = message.map(str::to_string);
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.state.lock().unwrap().receipt_mode = mode;
    }

    pub fn set_pending_polls(&self, polls: u32) {
        self.state.lock().unwrap().pending_polls = polls;
    }

    pub fn submitted(&self) -> Vec<TxRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Block tags of every read so far
    pub fn read_blocks(&self) -> Vec<BlockTag> {
        self.state.lock().unwrap().read_blocks.clone()
    }

    fn check_chain(state: &MockState, chain: ChainId) -> Result<(), GatewayError> {
        if state.chains.contains(&chain) {
            Ok(())
        } else {
            Err(GatewayError::UnsupportedChain(chain))
        }
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn supports(&self, chain: ChainId) -> bool {
        self.state.lock().unwrap().chains.contains(&chain)
    }

    async fn block_number(&self, chain: ChainId) -> Result<u64, GatewayError> {
        let state = self.state.lock().unwrap();
        Self::check_chain(&state, chain)?;
        if state.fail_block_number {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        Ok(state.block)
    }

    async fn call(
        &self,
        chain: ChainId,
        call: &ContractCall,
        block: BlockTag,
    ) -> Result<Bytes, GatewayError> {
        let mut state = self.state.lock().unwrap();
        Self::check_chain(&state, chain)?;
        state.read_blocks.push(block);
        if state.fail_reads {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        match state.uints.get(&(call.to, call.data.clone())) {
            Some(value) => Ok(Bytes::from(value.to_be_bytes::<32>().to_vec())),
            None => Err(GatewayError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            }),
        }
    }

    async fn native_balance(
        &self,
        chain: ChainId,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, GatewayError> {
        let mut state = self.state.lock().unwrap();
        Self::check_chain(&state, chain)?;
        state.read_blocks.push(block);
        if state.fail_reads {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(state.natives.get(&account).copied().unwrap_or(U256::ZERO))
    }

    async fn submit(&self, chain: ChainId, tx: &TxRequest) -> Result<TxHash, GatewayError> {
        let mut state = self.state.lock().unwrap();
        Self::check_chain(&state, chain)?;
        if let Some(message) = &state.submit_error {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: message.clone(),
            });
        }
        state.submitted.push(tx.clone());
        let nonce = state.submitted.len() as u64;
        Ok(B256::left_padding_from(&nonce.to_be_bytes()))
    }

    async fn receipt(&self, chain: ChainId, tx: TxHash) -> Result<Option<TxReceipt>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        Self::check_chain(&state, chain)?;

        let pending_polls = state.pending_polls;
        let polls = state.polls.entry(tx).or_insert(0);
        *polls += 1;
        if *polls <= pending_polls {
            return Ok(None);
        }

        let success = match state.receipt_mode {
            ReceiptMode::Success => true,
            ReceiptMode::Revert => false,
            ReceiptMode::Pending => return Ok(None),
        };
        Ok(Some(TxReceipt {
            tx_hash: tx,
            success,
            block_number: Some(state.block),
        }))
    }
}
