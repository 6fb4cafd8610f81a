//! Transaction Orchestrator
//!
//! One `Orchestrator` per pool action form. It owns the flow state, the
//! pending amount input and the receipt tracker; no state is shared between
//! forms.
//!
//! Token deposits read the allowance first. When it is short, only the
//! approval is sent and the flow halts: the user re-triggers the deposit once
//! the approval has confirmed.

use alloy_primitives::{Address, TxHash, U256};
use pool_model::{
    parse_units, transition, FlowEvent, FlowState, TransactionIntent, TransactionKind, UnitsError,
};
use thiserror::Error;
use tokio::time::Instant;

use crate::abi::{self, IERC20};
use crate::catalog::Pool;
use crate::confirmations::{BackoffPolicy, ConfirmationStatus, ConfirmationTracker};
use crate::gateway::{BlockTag, ChainGateway, TxRequest};
use crate::tx_builder::{build_allowance_call, build_approve_transaction, build_pool_transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("a transaction is already in flight: {0}")]
    Busy(TxHash),

    #[error("transaction {0} already submitted and cannot be cancelled")]
    AlreadySubmitted(TxHash),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] UnitsError),

    #[error("approve is issued by the deposit flow, not requested directly")]
    UnsupportedAction,

    #[error("nothing is awaiting confirmation")]
    NothingPending,
}

/// What a step of the flow produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Allowance was short; approval sent, deposit not sent
    ApprovalSubmitted { tx: TxHash },
    /// Deposit/withdraw/loan sent
    Submitted { tx: TxHash },
    /// Approval mined; the deposit can be re-triggered
    ApprovalConfirmed { tx: TxHash },
    /// Action mined; the pool's figures should be refreshed
    Succeeded { tx: TxHash, refresh_pool: String },
    /// Submission refused or transaction reverted; message is shown verbatim
    Failed { message: String },
    /// Polling gave up; the transaction may still confirm
    StillPending { tx: TxHash },
    /// User dismissed the action before submission
    Cancelled,
}

pub struct Orchestrator<'a, G: ?Sized> {
    gateway: &'a G,
    pool: &'a Pool,
    owner: Address,
    state: FlowState,
    intent: Option<TransactionIntent>,
    amount_input: String,
    approval_confirmed: bool,
    tracker: ConfirmationTracker,
}

impl<'a, G> Orchestrator<'a, G>
where
    G: ChainGateway + ?Sized,
{
    pub fn new(gateway: &'a G, pool: &'a Pool, owner: Address, backoff: BackoffPolicy) -> Self {
        Self {
            gateway,
            pool,
            owner,
            state: FlowState::Idle,
            intent: None,
            amount_input: String::new(),
            approval_confirmed: false,
            tracker: ConfirmationTracker::new(backoff),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn intent(&self) -> Option<&TransactionIntent> {
        self.intent.as_ref()
    }

    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    /// An approval for this form confirmed since the last settled action
    pub fn approval_confirmed(&self) -> bool {
        self.approval_confirmed
    }

    /// Human amount typed by the user, parsed on request
    pub fn set_amount(&mut self, input: impl Into<String>) {
        self.amount_input = input.into();
    }

    /// Start a deposit, withdraw or loan for the current amount input
    pub async fn request(
        &mut self,
        kind: TransactionKind,
    ) -> Result<FlowOutcome, OrchestratorError> {
        if kind == TransactionKind::Approve {
            return Err(OrchestratorError::UnsupportedAction);
        }
        if let Some(tx) = self.state.in_flight() {
            return Err(OrchestratorError::Busy(tx));
        }

        let amount = parse_units(&self.amount_input, self.pool.asset.decimals)?;
        if amount.is_zero() {
            return Err(OrchestratorError::ZeroAmount);
        }

        if kind == TransactionKind::Deposit && !self.pool.asset.source.is_native() {
            self.apply(FlowEvent::CheckAllowance);

            let allowance = self.read_allowance().await;
            if allowance < amount {
                log::info!(
                    "Allowance {} below {} for pool {}; requesting approval",
                    allowance,
                    amount,
                    self.pool.id
                );
                return Ok(self.submit_approval(amount).await);
            }
        }

        Ok(self.submit_action(kind, amount).await)
    }

    /// Wait for the in-flight transaction to resolve
    pub async fn await_settlement(&mut self) -> Result<FlowOutcome, OrchestratorError> {
        let tx = self.state.in_flight().ok_or(OrchestratorError::NothingPending)?;

        match self.tracker.wait_for(self.gateway, tx).await {
            Some(ConfirmationStatus::Confirmed(_)) => Ok(self.on_confirmed(tx)),
            Some(ConfirmationStatus::Reverted(_)) => {
                let message = format!("transaction {} reverted", tx);
                self.apply(FlowEvent::Reverted {
                    tx,
                    reason: message.clone(),
                });
                self.update_intent(|i| i.failed(message.clone()));
                Ok(FlowOutcome::Failed { message })
            }
            Some(ConfirmationStatus::TimedOut { attempts }) => {
                log::warn!("Stopped polling {} after {} attempts", tx, attempts);
                // Re-arm so a later await_settlement resumes polling
                self.tracker.track(self.pool.chain_id, tx, Instant::now());
                Ok(FlowOutcome::StillPending { tx })
            }
            None => {
                self.tracker.track(self.pool.chain_id, tx, Instant::now());
                Ok(FlowOutcome::StillPending { tx })
            }
        }
    }

    /// Dismiss the action or a settled result; refused while a transaction
    /// awaits its receipt
    pub fn cancel(&mut self) -> Result<FlowOutcome, OrchestratorError> {
        if let Some(tx) = self.state.in_flight() {
            return Err(OrchestratorError::AlreadySubmitted(tx));
        }
        self.apply(FlowEvent::Cancelled);
        self.intent = None;
        Ok(FlowOutcome::Cancelled)
    }

    /// Allowance of owner -> pool; read failures degrade to zero
    async fn read_allowance(&self) -> U256 {
        let Some(call) = build_allowance_call(self.pool, self.owner) else {
            return U256::MAX;
        };

        let read = match self.gateway.call(self.pool.chain_id, &call, BlockTag::Latest).await {
            Ok(data) => abi::decode_returns::<IERC20::allowanceCall>(&data).map(|r| r._0),
            Err(e) => Err(e),
        };

        read.unwrap_or_else(|e| {
            log::warn!("Allowance read for pool {} failed, treating as zero: {}", self.pool.id, e);
            U256::ZERO
        })
    }

    async fn submit_approval(&mut self, amount: U256) -> FlowOutcome {
        let Some(tx) = build_approve_transaction(self.pool, self.owner, amount) else {
            return self.fail_submission("native assets need no approval".to_string());
        };

        self.intent = Some(TransactionIntent::draft(
            TransactionKind::Approve,
            self.pool.id.clone(),
            amount,
        ));
        self.approval_confirmed = false;

        match self.send(&tx).await {
            Ok(hash) => {
                self.apply(FlowEvent::ApprovalSubmitted(hash));
                self.update_intent(|i| i.submitted(hash));
                log::info!("Approval submitted: {}", hash);
                FlowOutcome::ApprovalSubmitted { tx: hash }
            }
            Err(message) => self.fail_submission(message),
        }
    }

    async fn submit_action(&mut self, kind: TransactionKind, amount: U256) -> FlowOutcome {
        let tx = match build_pool_transaction(self.pool, self.owner, kind, amount) {
            Ok(tx) => tx,
            Err(e) => return self.fail_submission(e.to_string()),
        };

        self.intent = Some(TransactionIntent::draft(kind, self.pool.id.clone(), amount));

        match self.send(&tx).await {
            Ok(hash) => {
                self.apply(FlowEvent::ActionSubmitted(hash));
                self.update_intent(|i| i.submitted(hash));
                log::info!("{} submitted: {}", kind, hash);
                FlowOutcome::Submitted { tx: hash }
            }
            Err(message) => self.fail_submission(message),
        }
    }

    async fn send(&mut self, tx: &TxRequest) -> Result<TxHash, String> {
        let hash = self
            .gateway
            .submit(self.pool.chain_id, tx)
            .await
            .map_err(|e| e.to_string())?;
        self.tracker.track(self.pool.chain_id, hash, Instant::now());
        Ok(hash)
    }

    fn on_confirmed(&mut self, tx: TxHash) -> FlowOutcome {
        let was_approval = matches!(self.state, FlowState::AwaitingApproval { .. });
        self.apply(FlowEvent::Confirmed(tx));
        self.update_intent(|i| i.confirmed(tx));

        if was_approval {
            self.approval_confirmed = true;
            FlowOutcome::ApprovalConfirmed { tx }
        } else {
            self.amount_input.clear();
            self.approval_confirmed = false;
            FlowOutcome::Succeeded {
                tx,
                refresh_pool: self.pool.id.clone(),
            }
        }
    }

    fn fail_submission(&mut self, message: String) -> FlowOutcome {
        log::error!("Submission for pool {} failed: {}", self.pool.id, message);
        self.apply(FlowEvent::SubmissionFailed(message.clone()));
        self.update_intent(|i| i.failed(message.clone()));
        FlowOutcome::Failed { message }
    }

    fn apply(&mut self, event: FlowEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = transition(state, event);
    }

    fn update_intent(&mut self, f: impl FnOnce(TransactionIntent) -> TransactionIntent) {
        self.intent = self.intent.take().map(f);
    }
}

impl<G: ?Sized> std::fmt::Debug for Orchestrator<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pool", &self.pool.id)
            .field("owner", &self.owner)
            .field("state", &self.state)
            .field("intent", &self.intent)
            .field("amount_input", &self.amount_input)
            .finish()
    }
}
