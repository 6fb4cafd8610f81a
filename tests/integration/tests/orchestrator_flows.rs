//! Approve/deposit/withdraw/loan flows through the orchestrator

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolCall;
use pool_client::abi::{self, IERC20};
use pool_client::{FlowOutcome, Orchestrator, OrchestratorError};
use pool_integration_tests::*;
use pool_model::{FlowState, IntentStatus, Settlement, TransactionKind, UnitsError};

#[tokio::test]
async fn test_short_allowance_sends_only_approval() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_allowance(&pool, user(), U256::ZERO);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("50");
    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();

    let FlowOutcome::ApprovalSubmitted { tx } = outcome else {
        panic!("expected approval, got {:?}", outcome);
    };
    assert_eq!(orchestrator.state(), &FlowState::AwaitingApproval { tx });

    let submitted = gateway.submitted();
    assert_eq!(submitted.len(), 1, "deposit must not be sent with the approval");
    assert_eq!(submitted[0].to, token_address(&pool));
    assert_eq!(
        submitted[0].data,
        Bytes::from(
            IERC20::approveCall {
                spender: pool.pool_address,
                amount: units(50, 6)
            }
            .abi_encode()
        )
    );

    let intent = orchestrator.intent().unwrap();
    assert_eq!(intent.kind, TransactionKind::Approve);
    assert_eq!(intent.status, IntentStatus::Submitted { tx });
}

#[tokio::test]
async fn test_failed_allowance_read_requests_approval() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.fail_reads(true);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("1");
    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();

    assert!(matches!(outcome, FlowOutcome::ApprovalSubmitted { .. }));
}

#[tokio::test]
async fn test_approve_then_retrigger_deposit() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_allowance(&pool, user(), U256::ZERO);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("50");

    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();
    assert!(matches!(outcome, FlowOutcome::ApprovalSubmitted { .. }));

    let settled = orchestrator.await_settlement().await.unwrap();
    assert!(matches!(settled, FlowOutcome::ApprovalConfirmed { .. }));
    assert_eq!(orchestrator.state(), &FlowState::Idle);
    assert!(orchestrator.approval_confirmed());
    assert_eq!(orchestrator.amount_input(), "50");

    // Approval mined on chain
    gateway.set_allowance(&pool, user(), units(50, 6));

    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();
    let FlowOutcome::Submitted { tx } = outcome else {
        panic!("expected deposit submission, got {:?}", outcome);
    };

    let submitted = gateway.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1].to, pool.pool_address);
    assert_eq!(
        submitted[1].data,
        abi::encode_method(&pool.methods.deposit, &[abi::uint_arg(units(50, 6))]).unwrap()
    );
    assert_eq!(submitted[1].value, U256::ZERO);

    let settled = orchestrator.await_settlement().await.unwrap();
    assert_eq!(
        settled,
        FlowOutcome::Succeeded {
            tx,
            refresh_pool: pool.id.clone()
        }
    );
    assert_eq!(orchestrator.state(), &FlowState::Settled(Settlement::Success));
    assert_eq!(orchestrator.amount_input(), "");
    assert!(!orchestrator.approval_confirmed());
    assert_eq!(orchestrator.intent().unwrap().status, IntentStatus::Confirmed { tx });
}

#[tokio::test]
async fn test_sufficient_allowance_deposits_directly() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_allowance(&pool, user(), U256::MAX);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("12.5");
    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();

    assert!(matches!(outcome, FlowOutcome::Submitted { .. }));
    let submitted = gateway.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].data,
        abi::encode_method(&pool.methods.deposit, &[abi::uint_arg(U256::from(12_500_000u64))])
            .unwrap()
    );
}

#[tokio::test]
async fn test_native_deposit_attaches_value() {
    let gateway = MockGateway::local();
    let pool = native_pool();

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("1.5");
    let outcome = orchestrator.request(TransactionKind::Deposit).await.unwrap();

    assert!(matches!(outcome, FlowOutcome::Submitted { .. }));
    let submitted = gateway.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].to, pool.pool_address);
    assert_eq!(submitted[0].value, U256::from(1_500_000_000_000_000_000u128));
    assert_eq!(
        submitted[0].data,
        abi::encode_method(&pool.methods.native_deposit, &[]).unwrap()
    );
    // No allowance read for native pools
    assert!(gateway.read_blocks().is_empty());
}

#[tokio::test]
async fn test_withdraw_and_loan_skip_allowance() {
    let gateway = MockGateway::local();
    let pool = token_pool();

    for (kind, method) in [
        (TransactionKind::Withdraw, pool.methods.withdraw.clone()),
        (TransactionKind::Loan, pool.methods.loan.clone()),
    ] {
        let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
        orchestrator.set_amount("10");
        let outcome = orchestrator.request(kind).await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Submitted { .. }), "{}", kind);

        let last = gateway.submitted().pop().unwrap();
        let expected = abi::encode_method(&method, &[abi::uint_arg(units(10, 6))]).unwrap();
        assert_eq!(last.data, expected);
    }

    assert!(gateway.read_blocks().is_empty());
}

#[tokio::test]
async fn test_submission_failure_is_surfaced() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.fail_submissions(Some("insufficient funds for gas"));

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Withdraw).await.unwrap();

    let FlowOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(message.contains("insufficient funds for gas"), "{}", message);
    assert!(matches!(
        orchestrator.state(),
        FlowState::Settled(Settlement::Failed(m)) if *m == message
    ));
    assert_eq!(orchestrator.amount_input(), "5");
}

#[tokio::test]
async fn test_reverted_transaction_fails() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_receipt_mode(ReceiptMode::Revert);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    orchestrator.request(TransactionKind::Loan).await.unwrap();

    let settled = orchestrator.await_settlement().await.unwrap();
    assert!(matches!(settled, FlowOutcome::Failed { .. }));
    assert!(matches!(orchestrator.state(), FlowState::Settled(Settlement::Failed(_))));
    assert!(matches!(
        orchestrator.intent().unwrap().status,
        IntentStatus::Failed { .. }
    ));
}

#[tokio::test]
async fn test_slow_receipt_confirms_after_pending_polls() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_pending_polls(3);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    orchestrator.request(TransactionKind::Withdraw).await.unwrap();

    let settled = orchestrator.await_settlement().await.unwrap();
    assert!(matches!(settled, FlowOutcome::Succeeded { .. }));
}

#[tokio::test]
async fn test_unmined_transaction_stays_pending() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_receipt_mode(ReceiptMode::Pending);

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Withdraw).await.unwrap();
    let FlowOutcome::Submitted { tx } = outcome else {
        panic!("expected submission, got {:?}", outcome);
    };

    let settled = orchestrator.await_settlement().await.unwrap();
    assert_eq!(settled, FlowOutcome::StillPending { tx });
    assert_eq!(orchestrator.state(), &FlowState::AwaitingConfirmation { tx });

    // Mined later: polling resumes
    gateway.set_receipt_mode(ReceiptMode::Success);
    let settled = orchestrator.await_settlement().await.unwrap();
    assert!(matches!(settled, FlowOutcome::Succeeded { .. }));
}

#[tokio::test]
async fn test_busy_while_in_flight() {
    let gateway = MockGateway::local();
    let pool = token_pool();

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Withdraw).await.unwrap();
    let FlowOutcome::Submitted { tx } = outcome else {
        panic!("expected submission");
    };

    assert_eq!(
        orchestrator.request(TransactionKind::Withdraw).await,
        Err(OrchestratorError::Busy(tx))
    );
    assert_eq!(gateway.submitted().len(), 1);
}

#[tokio::test]
async fn test_cancel_only_before_submission() {
    let gateway = MockGateway::local();
    let pool = token_pool();

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    assert_eq!(orchestrator.cancel(), Ok(FlowOutcome::Cancelled));
    assert_eq!(orchestrator.state(), &FlowState::Idle);

    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Loan).await.unwrap();
    let FlowOutcome::Submitted { tx } = outcome else {
        panic!("expected submission");
    };
    assert_eq!(orchestrator.cancel(), Err(OrchestratorError::AlreadySubmitted(tx)));
    assert_eq!(orchestrator.state(), &FlowState::AwaitingConfirmation { tx });
}

#[tokio::test]
async fn test_cancel_dismisses_failed_result() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.fail_submissions(Some("boom"));

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Withdraw).await.unwrap();
    assert!(matches!(outcome, FlowOutcome::Failed { .. }));
    assert!(matches!(orchestrator.state(), FlowState::Settled(Settlement::Failed(_))));

    assert_eq!(orchestrator.cancel(), Ok(FlowOutcome::Cancelled));
    assert_eq!(orchestrator.state(), &FlowState::Idle);
    assert!(orchestrator.intent().is_none());
}

#[tokio::test]
async fn test_misconfigured_pool_method_fails_submission() {
    let gateway = MockGateway::local();
    let mut pool = token_pool();
    pool.methods.loan = "borrow(uint256,address)".to_string();

    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    orchestrator.set_amount("5");
    let outcome = orchestrator.request(TransactionKind::Loan).await.unwrap();

    let FlowOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(message.contains("borrow(uint256,address)"), "{}", message);
    assert!(matches!(orchestrator.state(), FlowState::Settled(Settlement::Failed(_))));
    assert!(gateway.submitted().is_empty());
}

#[tokio::test]
async fn test_rejects_bad_amounts() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    let mut orchestrator = Orchestrator::new(&gateway, &pool, user(), fast_backoff());

    orchestrator.set_amount("0");
    assert_eq!(
        orchestrator.request(TransactionKind::Withdraw).await,
        Err(OrchestratorError::ZeroAmount)
    );

    orchestrator.set_amount("abc");
    assert!(matches!(
        orchestrator.request(TransactionKind::Withdraw).await,
        Err(OrchestratorError::InvalidAmount(UnitsError::InvalidDigit(_)))
    ));

    orchestrator.set_amount("1.0000001");
    assert!(matches!(
        orchestrator.request(TransactionKind::Withdraw).await,
        Err(OrchestratorError::InvalidAmount(UnitsError::TooManyDecimals { .. }))
    ));

    orchestrator.set_amount("1");
    assert_eq!(
        orchestrator.request(TransactionKind::Approve).await,
        Err(OrchestratorError::UnsupportedAction)
    );

    assert!(gateway.submitted().is_empty());
    assert_eq!(
        orchestrator.await_settlement().await,
        Err(OrchestratorError::NothingPending)
    );
}

#[tokio::test]
async fn test_forms_do_not_share_state() {
    let gateway = MockGateway::local();
    let pool = token_pool();

    let mut deposit_form = Orchestrator::new(&gateway, &pool, user(), fast_backoff());
    let loan_form = Orchestrator::new(&gateway, &pool, user(), fast_backoff());

    deposit_form.set_amount("5");
    deposit_form.request(TransactionKind::Deposit).await.unwrap();

    assert!(deposit_form.state().in_flight().is_some());
    assert_eq!(loan_form.state(), &FlowState::Idle);
    assert_eq!(loan_form.amount_input(), "");
}
