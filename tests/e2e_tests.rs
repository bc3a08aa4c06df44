//! End-to-end HTTP tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ragvision::gateway::{RAGVISION_STATUS_READY, RagVisionStatus, check_health};
use ragvision::reasoning::MockInvoker;

use common::fixtures::{BLUE, BROWN, panel_base64};
use common::harness::{TestServerConfig, spawn_test_server};
use common::http_client::TestClient;

fn invocation(image: String) -> serde_json::Value {
    serde_json::json!({
        "encodedImage": image,
        "systemPrompt": "You inspect rooftop solar panels for soiling.",
        "userPrompt": "Classify the panel as dirty or clean and explain briefly.",
        "kRetrieval": 3,
        "maxPatchesPerClass": 2,
    })
}

async fn seed(client: &TestClient) {
    let dirty = client.upload("dirty", 0, panel_base64(BROWN, 1)).await;
    assert_eq!(dirty.status, 200, "{:?}", dirty.body);
    let clean = client.upload("clean", 1, panel_base64(BLUE, 2)).await;
    assert_eq!(clean.status, 200, "{:?}", clean.body);
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");

    let health = TestClient::new(server.url()).health().await;
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_health_check_inside_running_runtime() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    assert!(check_health(server.addr.port(), Duration::from_secs(2)).await);

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);
    assert!(!check_health(port, Duration::from_millis(500)).await);
}

#[tokio::test]
async fn test_ready_after_upload() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = TestClient::new(server.url());

    assert_eq!(client.ready().await.status, 503);
    seed(&client).await;

    let ready = client.ready().await;
    assert_eq!(ready.status, 200);
    assert_eq!(ready.status_header, RAGVISION_STATUS_READY);
    assert_eq!(ready.body["components"]["http"], RAGVISION_STATUS_READY);
}

#[tokio::test]
async fn test_upload_then_classify() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = TestClient::new(server.url());
    seed(&client).await;

    let resp = client.invoke(invocation(panel_base64(BROWN, 7))).await;
    assert_eq!(resp.status, 200, "{:?}", resp.body);
    assert_eq!(
        resp.status_header,
        RagVisionStatus::FlagRecognized.as_header_value()
    );
    assert_eq!(resp.body["flag"], "dirty");

    let evidence = resp.body["evidence"].as_array().expect("evidence array");
    assert_eq!(evidence.len(), 3);
    assert_eq!(evidence[0]["label"], "dirty");

    let resp = client.invoke(invocation(panel_base64(BLUE, 7))).await;
    assert_eq!(resp.body["flag"], "clean");
}

#[tokio::test]
async fn test_scores_do_not_depend_on_k() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = TestClient::new(server.url());
    seed(&client).await;

    let mut scores = Vec::new();
    for k in [0, 1, 4] {
        let mut body = invocation(panel_base64(BROWN, 7));
        body["kRetrieval"] = serde_json::json!(k);
        let resp = client.invoke(body).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["evidence"].as_array().unwrap().len(), k);
        scores.push(resp.body["classScores"].clone());
    }
    assert!(scores.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_malformed_transcript_falls_back_to_scores() {
    let config = TestServerConfig {
        invoker: Arc::new(MockInvoker::fixed("The image is too blurry to say.")),
        ..Default::default()
    };
    let server = spawn_test_server(config).await.expect("Server should start");
    let client = TestClient::new(server.url());
    seed(&client).await;

    let resp = client.invoke(invocation(panel_base64(BLUE, 7))).await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.status_header,
        RagVisionStatus::FlagDefault.as_header_value()
    );
    assert_eq!(resp.body["flag"], "clean");
    assert_eq!(resp.body["explanation"], "The image is too blurry to say.");
}

#[tokio::test]
async fn test_inference_before_upload_is_conflict() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = TestClient::new(server.url());

    let resp = client.invoke(invocation(panel_base64(BROWN, 7))).await;
    assert_eq!(resp.status, 409);
    assert_eq!(resp.body["success"], false);
}

#[tokio::test]
async fn test_uploads_are_persisted_per_class() {
    let config = TestServerConfig {
        persist_uploads: true,
        ..Default::default()
    };
    let server = spawn_test_server(config).await.expect("Server should start");
    let client = TestClient::new(server.url());
    seed(&client).await;

    let root = server.support_root.clone().expect("support root");
    assert!(root.join("dirty").join("dirty_0.png").is_file());
    assert!(root.join("clean").join("clean_1.png").is_file());

    let reset = client.upload("clean", 0, panel_base64(BLUE, 3)).await;
    assert_eq!(
        reset.status_header,
        RagVisionStatus::SupportReset.as_header_value()
    );
    assert!(!root.join("dirty").join("dirty_0.png").exists());
    assert!(!root.join("clean").join("clean_1.png").exists());
    assert!(root.join("clean").join("clean_0.png").is_file());
    assert_eq!(server.service.index().count_for("dirty").unwrap(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_invocations_agree() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = TestClient::new(server.url());
    seed(&client).await;

    let requests = (0..6).map(|_| client.invoke(invocation(panel_base64(BROWN, 7))));
    let responses = futures::future::join_all(requests).await;

    let first = &responses[0];
    assert_eq!(first.status, 200);
    for resp in &responses {
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body["flag"], first.body["flag"]);
        assert_eq!(resp.body["classScores"], first.body["classScores"]);
        assert_eq!(resp.body["evidence"], first.body["evidence"]);
    }
}
