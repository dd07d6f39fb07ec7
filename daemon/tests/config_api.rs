//! Tests for uploading and listing `.seospider` configurations.

mod common;

use axum::http::StatusCode;
use common::{body_json, StubCrawler, TestApp};
use serde_json::json;

#[tokio::test]
async fn uploaded_config_appears_in_list() {
    let app = TestApp::new(StubCrawler::exiting(0)).await;

    let response = app.upload("x.seospider", b"<seospider/>").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Config file 'x.seospider' uploaded successfully."
    );

    let list = body_json(app.get("/config/list/").await).await;
    assert_eq!(list["config_files"], json!(["x.seospider"]));
    assert_eq!(std::fs::read(app.config_dir().join("x.seospider")).unwrap(), b"<seospider/>");
}

#[tokio::test]
async fn wrong_extension_is_rejected_and_not_written() {
    let app = TestApp::new(StubCrawler::exiting(0)).await;

    let response = app.upload("notes.txt", b"hello").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(app.config_dir()).unwrap().count(), 0);

    let list = body_json(app.get("/config/list/").await).await;
    assert_eq!(list["config_files"], json!([]));
}

#[tokio::test]
async fn path_traversal_name_is_rejected() {
    let app = TestApp::new(StubCrawler::exiting(0)).await;
    let response = app.upload("../escape.seospider", b"x").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!app.dir.path().join("escape.seospider").exists());
}

#[tokio::test]
async fn uploaded_config_is_passed_to_crawler() {
    let app = TestApp::new(StubCrawler::writing("a_all_links.csv")).await;
    app.upload("deep.seospider", b"<seospider/>").await;

    let id = app
        .submit(json!({"url": "https://example.com", "config_file": "deep.seospider"}))
        .await;
    let job = app.wait_until_finished(&id).await;
    assert_eq!(job["status"], "completed");

    let calls = app.crawler.calls.lock().unwrap();
    let expected = app.config_dir().join("deep.seospider");
    assert_eq!(calls[0].flag_value("--config"), expected.to_str());
}
