use super::*;
use crate::index::LabelSet;
use crate::patch::SourceImage;
use crate::prompt::PromptAssembler;
use image::{Rgb, RgbImage};
use std::time::Duration;

fn params() -> SamplingParams {
    SamplingParams {
        temperature: 0.2,
        top_p: 0.9,
        max_new_tokens: 64,
    }
}

fn prompt() -> PromptRequest {
    let query = SourceImage::new(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]))).unwrap();
    PromptAssembler::new().assemble(
        "You are an inspector.",
        "Is the panel dirty?",
        &query,
        &[],
        &LabelSet::new(["dirty", "clean"]).unwrap(),
    )
}

fn invoker(base_url: &str) -> OpenAiInvoker {
    OpenAiInvoker::new(OpenAiConfig {
        base_url: base_url.to_string(),
        model: "test-vlm".to_string(),
        api_key: Some("secret".to_string()),
    })
}

#[test]
fn test_sampling_validation() {
    assert!(params().validate().is_ok());

    let mut p = params();
    p.temperature = -0.1;
    assert!(matches!(p.validate(), Err(ReasoningError::InvalidSampling { .. })));

    let mut p = params();
    p.top_p = 0.0;
    assert!(p.validate().is_err());

    let mut p = params();
    p.top_p = f32::NAN;
    assert!(p.validate().is_err());

    let mut p = params();
    p.max_new_tokens = 0;
    assert!(p.validate().is_err());
}

#[test]
fn test_endpoint_joins_base_url() {
    assert_eq!(
        invoker("http://localhost:8000/v1/").config().endpoint(),
        "http://localhost:8000/v1/chat/completions"
    );
}

#[test]
fn test_build_request_shape() {
    let request = invoker("http://unused").build_request(&prompt(), &params()).unwrap();
    let value = serde_json::to_value(&request).unwrap();

    assert_eq!(value["model"], "test-vlm");
    assert_eq!(value["max_completion_tokens"], 64);

    let messages = value["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "You are an inspector.");

    let content = messages[1]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[0]["type"], "text");
    assert_eq!(content[0]["text"], "Is the panel dirty?");
    assert_eq!(content[1]["type"], "image_url");
    assert!(
        content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
}

fn completion(content: serde_json::Value) -> async_openai::types::chat::CreateChatCompletionResponse {
    serde_json::from_value(serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 0,
        "model": "test-vlm",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
    .unwrap()
}

#[test]
fn test_transcript_from_completion() {
    let text = openai::transcript_from(completion("DirtyFlag: true".into())).unwrap();
    assert_eq!(text, "DirtyFlag: true");

    let err = openai::transcript_from(completion(serde_json::Value::Null)).unwrap_err();
    assert_eq!(err, ReasoningError::EmptyTranscript);
}

async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

#[tokio::test]
async fn test_openai_invoker_round_trip() {
    use axum::{Json, http::HeaderMap, routing::post};

    let router = axum::Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let images = body["messages"][1]["content"]
                .as_array()
                .map(|c| c.iter().filter(|p| p["type"] == "image_url").count())
                .unwrap_or(0);
            let model = body["model"].clone();
            Json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 0,
                "model": model,
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": format!("clean ({auth}, {images} images)")
                    },
                    "finish_reason": "stop"
                }]
            }))
        }),
    );
    let base_url = serve(router).await;

    let text = invoker(&base_url).generate(&prompt(), &params()).await.unwrap();
    assert_eq!(text, "clean (Bearer secret, 1 images)");
}

#[tokio::test]
async fn test_openai_invoker_maps_http_errors() {
    use axum::{http::StatusCode, routing::post};

    let router = axum::Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
    );
    let base_url = serve(router).await;

    let err = invoker(&base_url)
        .generate(&prompt(), &params())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ReasoningError::Status {
            status: 503,
            body: "model loading".to_string()
        }
    );
}

#[tokio::test]
async fn test_openai_invoker_unreachable() {
    let err = invoker("http://127.0.0.1:9/v1")
        .generate(&prompt(), &params())
        .await
        .unwrap_err();
    assert!(matches!(err, ReasoningError::Unavailable { .. }));
}

#[tokio::test]
async fn test_mock_behaviors() {
    let fixed = MockInvoker::fixed("dirty");
    assert_eq!(fixed.generate(&prompt(), &params()).await.unwrap(), "dirty");
    assert_eq!(fixed.calls(), 1);

    let failing = MockInvoker::new(MockBehavior::Unavailable);
    assert!(matches!(
        failing.generate(&prompt(), &params()).await,
        Err(ReasoningError::Unavailable { .. })
    ));

    let top = MockInvoker::top_evidence();
    let text = top.generate(&prompt(), &params()).await.unwrap();
    assert!(text.contains("no reference patches"));
    assert_eq!(top.backend_name(), "mock");
}

#[tokio::test]
async fn test_mock_rejects_invalid_sampling() {
    let mock = MockInvoker::fixed("dirty");
    let mut p = params();
    p.max_new_tokens = 0;
    assert!(mock.generate(&prompt(), &p).await.is_err());
}

#[tokio::test]
async fn test_delayed_mock_can_be_abandoned() {
    let mock = MockInvoker::new(MockBehavior::Delayed(Duration::from_secs(60)));
    let prompt = prompt();
    let params = params();
    let result =
        tokio::time::timeout(Duration::from_millis(50), mock.generate(&prompt, &params)).await;
    assert!(result.is_err());
    assert_eq!(mock.calls(), 1);
}
