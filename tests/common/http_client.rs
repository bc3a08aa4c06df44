//! HTTP client helpers for tests.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_HEADER: &str = "x-ragvision-status";

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub status_header: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn invoke(&self, body: serde_json::Value) -> TestResponse {
        self.post("/ragvision/invocations", body).await
    }

    pub async fn upload(&self, class: &str, index: u32, encoded_image: String) -> TestResponse {
        let body = serde_json::json!({
            "className": class,
            "classes": ["dirty", "clean"],
            "index": index,
            "encodedImage": encoded_image,
        });
        self.post("/support/upload/image", body).await
    }

    pub async fn health(&self) -> HealthResponse {
        self.client
            .get(self.url("/ragvision/healthcheck"))
            .send()
            .await
            .expect("health request")
            .json()
            .await
            .expect("health body")
    }

    pub async fn ready(&self) -> TestResponse {
        let resp = self
            .client
            .get(self.url("/ready"))
            .send()
            .await
            .expect("ready request");
        Self::read(resp).await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> TestResponse {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("request should reach the server");
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> TestResponse {
        let status = resp.status().as_u16();
        let status_header = resp
            .headers()
            .get(STATUS_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = resp.json().await.unwrap_or(serde_json::Value::Null);
        TestResponse {
            status,
            status_header,
            body,
        }
    }
}
