use crate::harness;
use assert_json_diff::assert_json_include;
use fourslash_lsp::config::HarnessConfig;
use fourslash_lsp::{QueryDriver, Target};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_initialize_result_is_returned() {
    let service = Arc::new(harness::stdio_service());
    let mut driver =
        QueryDriver::from_fixture("const x = 1;", service, HarnessConfig::default()).unwrap();

    let result = driver.start().await.expect("Initialize failed");
    assert_json_include!(
        actual: result,
        expected: json!({
            "serverInfo": { "name": "toy-server" },
            "capabilities": {
                "completionProvider": { "resolveProvider": true, "triggerCharacters": ["."] },
                "hoverProvider": true,
                "textDocumentSync": 1
            }
        })
    );
}

#[tokio::test]
async fn test_server_notifications_are_recorded() {
    let driver = harness::start("const x = 1;").await;

    let mut messages = Vec::new();
    for _ in 0..100 {
        messages = driver.service().notifications_by_method("window/logMessage");
        if !messages.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(messages.len(), 1);
    assert_json_include!(
        actual: messages[0].params.clone().unwrap_or_default(),
        expected: json!({ "type": 3, "message": "toy server initialized" })
    );
}

#[tokio::test]
async fn test_start_activates_first_file() {
    let fixture = r#"// @Filename: /a.ts
const a = 1;
// @Filename: /b.ts
const b = 2;/*end*/"#;
    let mut driver = harness::start(fixture).await;

    assert_eq!(driver.active_file().unwrap().path, "/a.ts");
    assert_eq!(driver.caret(), tower_lsp::lsp_types::Position::new(0, 0));

    driver.go_to_marker("end").unwrap();
    assert_eq!(driver.active_file().unwrap().path, "/b.ts");

    driver.go_to_bof();
    assert_eq!(driver.caret(), tower_lsp::lsp_types::Position::new(0, 0));
    driver.go_to_eof();
    assert_eq!(driver.caret(), tower_lsp::lsp_types::Position::new(0, 12));

    driver.go_to_file_number(0).unwrap();
    assert_eq!(driver.active_file().unwrap().path, "/a.ts");
    assert!(driver.go_to_file_number(2).unwrap_err().is_malformed_fixture());
}

#[tokio::test]
async fn test_requests_after_shutdown_fail() {
    let mut config = HarnessConfig::default();
    config.query.timeout_ms = 500;
    let mut driver = harness::start_with_config("const x = 1;\n/*1*/", config).await;

    driver.shutdown().await.expect("Shutdown failed");

    let err = driver.completions(Target::Marker("1")).await.unwrap_err();
    assert!(err.is_service_fault(), "{err}");
}
