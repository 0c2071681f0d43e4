use crate::harness;
use fourslash_lsp::expect::FailureKind;
use fourslash_lsp::Target;
use tower_lsp::lsp_types::{Position, Range};

#[tokio::test]
async fn test_quick_info_with_documentation() {
    let fixture = "/** The answer. */\nconst answer = 42;\nansw/*1*/er;";
    let mut driver = harness::start(fixture).await;

    driver
        .verify_quick_info_at("1", "const answer: number", Some("The answer."))
        .await
        .unwrap()
        .assert_pass();
}

#[tokio::test]
async fn test_quick_info_follows_imports() {
    let fixture = r#"// @Filename: /lib/api.ts
export declare const api: { get: string };
// @Filename: /main.ts
import { api } from "./lib/api";
/*h*/api.get;"#;
    let mut driver = harness::start(fixture).await;

    driver
        .verify_quick_info_at("h", "const api: { get: string }", Some(""))
        .await
        .unwrap()
        .assert_pass();

    let hover = driver.hover(Target::Caret).await.unwrap().unwrap();
    assert_eq!(
        hover.range,
        Some(Range::new(Position::new(1, 0), Position::new(1, 3)))
    );
}

#[tokio::test]
async fn test_quick_info_mismatch_names_marker() {
    let fixture = "const answer = 42;\nanswer/*1*/;";
    let mut driver = harness::start(fixture).await;

    let verdict = driver
        .verify_quick_info_at("1", "const answer: string", None)
        .await
        .unwrap();
    assert!(matches!(
        verdict.kind(),
        Some(FailureKind::HoverMismatch { field: "display", .. })
    ));
    assert!(verdict.to_string().starts_with("At marker '1' in /main.ts"));
}

#[tokio::test]
async fn test_no_quick_info_on_whitespace() {
    let fixture = "const answer = 42;\n /*1*/ ";
    let mut driver = harness::start(fixture).await;

    let verdict = driver.verify_quick_info_at("1", "anything", None).await.unwrap();
    assert_eq!(verdict.kind(), Some(&FailureKind::MissingHover));
}

#[tokio::test]
async fn test_hover_at_position_in_active_file() {
    let fixture = r#"// @Filename: /a.ts
const first = 1;
// @Filename: /b.ts
const second = "two";"#;
    let mut driver = harness::start(fixture).await;

    driver.go_to_file("/b.ts").unwrap();
    let hover = driver
        .hover(Position::new(0, 8))
        .await
        .unwrap()
        .expect("hover on declaration name");
    assert_eq!(hover.display, "const second: string");
    assert!(hover.documentation.is_empty());
}
