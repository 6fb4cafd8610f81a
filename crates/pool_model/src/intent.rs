//! Transaction intent lifecycle and per-action flow state machine
//!
//! Transitions are total: an event that does not apply to the current state
//! leaves it unchanged.

use alloy_primitives::{TxHash, U256};

/// User-initiated action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Approve,
    Deposit,
    Withdraw,
    Loan,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::Approve => "approve",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Loan => "loan",
        };
        f.write_str(s)
    }
}

/// drafted -> submitted -> confirmed | failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Drafted,
    Submitted { tx: TxHash },
    Confirmed { tx: TxHash },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub kind: TransactionKind,
    pub pool_id: String,
    /// Raw amount in the pool asset's smallest unit
    pub amount: U256,
    pub status: IntentStatus,
}

impl TransactionIntent {
    pub fn draft(kind: TransactionKind, pool_id: impl Into<String>, amount: U256) -> Self {
        Self {
            kind,
            pool_id: pool_id.into(),
            amount,
            status: IntentStatus::Drafted,
        }
    }

    /// Drafted -> Submitted
    pub fn submitted(mut self, tx: TxHash) -> Self {
        if self.status == IntentStatus::Drafted {
            self.status = IntentStatus::Submitted { tx };
        }
        self
    }

    /// Submitted(tx) -> Confirmed(tx)
    pub fn confirmed(mut self, tx: TxHash) -> Self {
        if self.status == (IntentStatus::Submitted { tx }) {
            self.status = IntentStatus::Confirmed { tx };
        }
        self
    }

    /// Drafted | Submitted -> Failed
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        if matches!(self.status, IntentStatus::Drafted | IntentStatus::Submitted { .. }) {
            self.status = IntentStatus::Failed {
                reason: reason.into(),
            };
        }
        self
    }

}

/// Terminal result of an action flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Success,
    Failed(String),
}

/// idle -> checking_allowance -> awaiting_approval -> awaiting_confirmation -> settled
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    CheckingAllowance,
    AwaitingApproval { tx: TxHash },
    AwaitingConfirmation { tx: TxHash },
    Settled(Settlement),
}

impl FlowState {
    /// A transaction is out on the network and not yet resolved
    pub fn in_flight(&self) -> Option<TxHash> {
        match self {
            FlowState::AwaitingApproval { tx } | FlowState::AwaitingConfirmation { tx } => {
                Some(*tx)
            }
            _ => None,
        }
    }

    /// No transaction is awaiting a receipt, so the form can be dismissed
    pub fn can_cancel(&self) -> bool {
        self.in_flight().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Token deposit requested; allowance must be read first
    CheckAllowance,
    /// Allowance too low; approval sent and the flow halts
    ApprovalSubmitted(TxHash),
    /// Deposit/withdraw/loan sent
    ActionSubmitted(TxHash),
    /// Receipt with success status observed
    Confirmed(TxHash),
    /// Receipt with failure status observed
    Reverted { tx: TxHash, reason: String },
    /// Gateway refused the submission
    SubmissionFailed(String),
    /// User dismissed the action
    Cancelled,
}

/// Apply `event` to `state`
pub fn transition(state: FlowState, event: FlowEvent) -> FlowState {
    use FlowEvent as E;
    use FlowState as S;

    match (state, event) {
        (S::Idle | S::Settled(_), E::CheckAllowance) => S::CheckingAllowance,

        (S::CheckingAllowance, E::ApprovalSubmitted(tx)) => S::AwaitingApproval { tx },

        (S::Idle | S::CheckingAllowance | S::Settled(_), E::ActionSubmitted(tx)) => {
            S::AwaitingConfirmation { tx }
        }

        // Approval confirmed: back to idle, the user re-triggers the deposit
        (S::AwaitingApproval { tx }, E::Confirmed(h)) if h == tx => S::Idle,
        (S::AwaitingConfirmation { tx }, E::Confirmed(h)) if h == tx => {
            S::Settled(Settlement::Success)
        }

        (S::AwaitingApproval { tx } | S::AwaitingConfirmation { tx }, E::Reverted { tx: h, reason })
            if h == tx =>
        {
            S::Settled(Settlement::Failed(reason))
        }

        (S::Idle | S::CheckingAllowance | S::Settled(_), E::SubmissionFailed(reason)) => {
            S::Settled(Settlement::Failed(reason))
        }

        // Dismissing a settled result resets the form as well
        (state, E::Cancelled) if state.can_cancel() => S::Idle,

        (state, _) => state,
    }
}
