#![allow(non_snake_case)]

use darkpool_client::{
    ChainStateClient,
    ClientConfig,
    error::FetchError,
    test_helpers::{
        StubNode,
        TEST_ADDRESS,
        unreachable_url,
    },
    types::{
        MarketId,
        PoolState,
        Resolution,
        TransactionId,
    },
};
use reqwest::StatusCode;

const PROGRAM: &str = "/testnet/program/zk_dark_pool.aleo";

fn mapping_path(mapping: &str, key: &str) -> String {
    format!("{PROGRAM}/mapping/{mapping}/{key}")
}

fn route(
    path: impl Into<String>,
    status: u16,
    body: impl Into<String>,
) -> (String, u16, String) {
    (path.into(), status, body.into())
}

fn market_literal() -> String {
    format!(
        "{{\n  creator: {TEST_ADDRESS},\n  resolution_height: 150000u32,\n  resolved: false,\n  winning_outcome: 0u8\n}}"
    )
}

fn client(node: &StubNode) -> ChainStateClient {
    ChainStateClient::new(node.config()).unwrap()
}

#[tokio::test]
async fn mapping_value__absent_key_is_none_after_a_single_request() {
    // given
    let node = StubNode::start(vec![]).await;
    let client = client(&node);

    // when
    let value = client.mapping_value("markets", "42field").await.unwrap();

    // then
    assert_eq!(value, None);
    assert_eq!(node.hits(&mapping_path("markets", "42field")), 1);
    assert_eq!(node.requests().len(), 1);
}

#[tokio::test]
async fn mapping_value__null_body_is_none() {
    // given
    let node =
        StubNode::start(vec![route(mapping_path("pools", "7field"), 200, "null")]).await;

    // when
    let value = client(&node).mapping_value("pools", "7field").await.unwrap();

    // then
    assert_eq!(value, None);
}

#[tokio::test]
async fn mapping_value__server_error_is_unexpected_status() {
    // given
    let node =
        StubNode::start(vec![route(mapping_path("pools", "7field"), 500, "boom")]).await;

    // when
    let result = client(&node).mapping_value("pools", "7field").await;

    // then
    assert!(matches!(
        result,
        Err(FetchError::Unexpected(status)) if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
}

#[tokio::test]
async fn mapping_value__unreachable_node_is_reported() {
    // given
    let config = ClientConfig {
        rpc_url: unreachable_url(),
        ..ClientConfig::default()
    };
    let client = ChainStateClient::new(config).unwrap();

    // when
    let result = client.mapping_value("markets", "1field").await;

    // then
    assert!(matches!(result, Err(FetchError::Unreachable(_))));
}

#[tokio::test]
async fn market__decodes_quoted_struct_literal() {
    // given
    let body = serde_json::to_string(&market_literal()).unwrap();
    let node =
        StubNode::start(vec![route(mapping_path("markets", "42field"), 200, body)]).await;
    let market_id: MarketId = "42".parse().unwrap();

    // when
    let market = client(&node).market(&market_id).await.unwrap();

    // then
    assert_eq!(market.creator.as_str(), TEST_ADDRESS);
    assert_eq!(market.resolution, Resolution::Height(150_000));
    assert!(!market.resolved);
    assert_eq!(market.winner(), None);
}

#[tokio::test]
async fn market__malformed_record_is_none() {
    // given
    let node = StubNode::start(vec![route(
        mapping_path("markets", "42field"),
        200,
        "{creator: aleo1abc, resolved: false}",
    )])
    .await;
    let market_id: MarketId = "42".parse().unwrap();

    // when
    let market = client(&node).market(&market_id).await;

    // then
    assert_eq!(market, None);
}

#[tokio::test]
async fn market__server_error_is_none() {
    // given
    let node =
        StubNode::start(vec![route(mapping_path("markets", "42field"), 503, "")]).await;
    let market_id: MarketId = "42".parse().unwrap();

    // when
    let market = client(&node).market(&market_id).await;

    // then
    assert_eq!(market, None);
}

#[tokio::test]
async fn pool__keeps_inconsistent_totals_as_reported() {
    // given
    let node = StubNode::start(vec![route(
        mapping_path("pools", "42field"),
        200,
        "{total_yes: 5u64, total_no: 5u64, total_pool: 11u64}",
    )])
    .await;
    let market_id: MarketId = "42".parse().unwrap();

    // when
    let pool = client(&node).pool(&market_id).await.unwrap();

    // then
    assert_eq!(
        pool,
        PoolState {
            total_yes: 5,
            total_no: 5,
            total_pool: 11,
        }
    );
    assert!(!pool.is_consistent());
}

#[tokio::test]
async fn market_snapshot__zeroes_missing_pool() {
    // given
    let node = StubNode::start(vec![route(
        mapping_path("markets", "42field"),
        200,
        market_literal(),
    )])
    .await;
    let market_id: MarketId = "42".parse().unwrap();

    // when
    let snapshot = client(&node).market_snapshot(&market_id).await.unwrap();

    // then
    assert_eq!(snapshot.market_id, market_id);
    assert_eq!(snapshot.pool, PoolState::default());
    assert_eq!(node.hits(&mapping_path("pools", "42field")), 1);
}

#[tokio::test]
async fn market_snapshot__unknown_market_is_none() {
    let node = StubNode::start(vec![]).await;
    let market_id: MarketId = "42".parse().unwrap();

    assert_eq!(client(&node).market_snapshot(&market_id).await, None);
}

#[tokio::test]
async fn program_live__follows_program_endpoint_status() {
    // given
    let source = "\"program zk_dark_pool.aleo;\"";
    let deployed = StubNode::start(vec![route(PROGRAM, 200, source)]).await;
    let missing = StubNode::start(vec![]).await;

    // then
    assert!(client(&deployed).program_live().await);
    assert!(!client(&missing).program_live().await);
}

#[tokio::test]
async fn latest_height__parses_decimal_body() {
    // given
    let node =
        StubNode::start(vec![route("/testnet/block/height/latest", 200, "123456")]).await;

    // when
    let height = client(&node).latest_height().await.unwrap();

    // then
    assert_eq!(height, 123_456);
}

#[tokio::test]
async fn transaction__unknown_id_is_none() {
    // given
    let node = StubNode::start(vec![route(
        "/testnet/transaction/at1known",
        200,
        r#"{"type":"execute","id":"at1known"}"#,
    )])
    .await;
    let client = client(&node);

    // when
    let known = client
        .transaction(&TransactionId::new("at1known"))
        .await
        .unwrap();
    let unknown = client
        .transaction(&TransactionId::new("at1unknown"))
        .await
        .unwrap();

    // then
    assert_eq!(known.unwrap()["type"], "execute");
    assert_eq!(unknown, None);
}

#[tokio::test]
async fn recent_transactions__passes_limit_and_returns_node_order() {
    // given
    let node = StubNode::start(vec![route(
        format!("{PROGRAM}/transactions"),
        200,
        r#"[{"id":"at1newest"},{"id":"at1older"}]"#,
    )])
    .await;

    // when
    let transactions = client(&node).recent_transactions(5).await.unwrap();

    // then
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["id"], "at1newest");
    assert_eq!(node.requests(), vec![format!("{PROGRAM}/transactions?limit=5")]);
}

#[tokio::test]
async fn recent_transactions__unknown_program_has_none() {
    // given
    let node = StubNode::start(vec![]).await;

    // when
    let transactions = client(&node).recent_transactions(10).await.unwrap();

    // then
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn recent_transactions__non_array_body_is_invalid() {
    // given
    let node = StubNode::start(vec![route(
        format!("{PROGRAM}/transactions"),
        200,
        r#"{"error":"rate limited"}"#,
    )])
    .await;

    // when
    let result = client(&node).recent_transactions(10).await;

    // then
    assert!(matches!(result, Err(FetchError::InvalidBody(_))));
}
