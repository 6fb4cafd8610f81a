//! Balance reads against the mock gateway

use alloy_primitives::U256;
use pool_client::{
    balance_or_zero, read_balance, AssetSource, BalanceFailure, BalanceReading, BlockTag,
};
use pool_integration_tests::*;

#[tokio::test]
async fn test_token_balance_reads() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_token_balance(token_address(&pool), user(), units(250, 6));

    let source = &pool.asset.source;
    let reading = read_balance(&gateway, source, Some(USER), LOCAL_CHAIN, BlockTag::Latest).await;
    assert_eq!(reading, BalanceReading::Ok(units(250, 6)));
}

#[tokio::test]
async fn test_native_balance_reads() {
    let gateway = MockGateway::local();
    gateway.set_native(user(), units(3, 18));

    let source = AssetSource::Native;
    let reading =
        read_balance(&gateway, &source, Some(USER), LOCAL_CHAIN, BlockTag::Number(7)).await;
    assert_eq!(reading, BalanceReading::Ok(units(3, 18)));
    assert_eq!(gateway.read_blocks(), vec![BlockTag::Number(7)]);
}

#[tokio::test]
async fn test_failures_are_tagged_and_read_as_zero() {
    let gateway = MockGateway::local();
    let source = token_pool().asset.source;

    let missing = read_balance(&gateway, &source, None, LOCAL_CHAIN, BlockTag::Latest).await;
    assert_eq!(missing.failure(), Some(&BalanceFailure::MissingAccount));

    let malformed =
        read_balance(&gateway, &source, Some("0x1234"), LOCAL_CHAIN, BlockTag::Latest).await;
    assert!(matches!(malformed.failure(), Some(BalanceFailure::MalformedAccount(_))));

    let unsupported = read_balance(&gateway, &source, Some(USER), 999, BlockTag::Latest).await;
    assert_eq!(unsupported.failure(), Some(&BalanceFailure::UnsupportedChain(999)));

    gateway.fail_reads(true);
    let failed = read_balance(&gateway, &source, Some(USER), LOCAL_CHAIN, BlockTag::Latest).await;
    assert!(matches!(failed.failure(), Some(BalanceFailure::ReadFailed(_))));

    for reading in [missing, malformed, unsupported, failed] {
        assert!(!reading.is_ok());
        assert_eq!(reading.or_zero(), U256::ZERO);
    }
}

#[tokio::test]
async fn test_no_gateway_call_without_valid_account() {
    let gateway = MockGateway::local();
    let source = token_pool().asset.source;

    let _ = read_balance(&gateway, &source, None, LOCAL_CHAIN, BlockTag::Latest).await;
    let account = Some("not-an-address");
    let _ = read_balance(&gateway, &source, account, LOCAL_CHAIN, BlockTag::Latest).await;

    assert!(gateway.read_blocks().is_empty());
}

#[tokio::test]
async fn test_balance_or_zero_degrades() {
    let gateway = MockGateway::local();
    let pool = token_pool();
    gateway.set_token_balance(token_address(&pool), user(), U256::from(42u64));

    assert_eq!(
        balance_or_zero(&gateway, &pool.asset.source, Some(USER), LOCAL_CHAIN).await,
        U256::from(42u64)
    );

    gateway.fail_reads(true);
    assert_eq!(
        balance_or_zero(&gateway, &pool.asset.source, Some(USER), LOCAL_CHAIN).await,
        U256::ZERO
    );
}
