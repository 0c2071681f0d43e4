use crate::harness;
use fourslash_lsp::config::HarnessConfig;
use fourslash_lsp::{HarnessError, QueryDriver, ServiceError, Target};
use serde_json::json;
use std::sync::Arc;
use tower_lsp::lsp_types::Position;

#[tokio::test]
async fn test_unknown_method_is_rpc_error() {
    let driver = harness::start("const x = 1;").await;

    let err = driver
        .service()
        .request("custom/unknown", json!({}))
        .await
        .unwrap_err();
    match err {
        ServiceError::Rpc { code, .. } => assert_eq!(code, -32601),
        other => panic!("expected method-not-found, got {other}"),
    }
}

#[tokio::test]
async fn test_unknown_marker_is_malformed_fixture() {
    let mut driver = harness::start("const x = 1;/*1*/").await;

    let err = driver.verify_completions("2", None).await.unwrap_err();
    assert!(err.is_malformed_fixture());
    assert!(err.to_string().contains("Marker '2' not found"));
}

#[tokio::test]
async fn test_duplicate_marker_is_rejected_before_start() {
    let service = Arc::new(harness::stdio_service());
    let result = QueryDriver::from_fixture(
        "// @Filename: /a.ts\n/*m*/\n// @Filename: /b.ts\n/*m*/",
        service,
        HarnessConfig::default(),
    );
    assert!(matches!(result, Err(HarnessError::DuplicateMarker { .. })));
}

#[tokio::test]
async fn test_position_outside_file_is_rejected() {
    let mut driver = harness::start("const x = 1;").await;

    let err = driver
        .completions(Target::Position(Position::new(3, 0)))
        .await
        .unwrap_err();
    assert!(err.is_malformed_fixture());
    assert!(err.to_string().contains("outside /main.ts"));
}
