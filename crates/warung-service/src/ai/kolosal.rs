//! Kolosal API client: open-vocabulary segmentation and chat completions.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use warung_core::DetectResponse;

use super::AiError;

/// Minimum detector score the segmentation endpoint is asked to return.
pub const DETECTION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Serialize)]
struct SegmentRequest<'a> {
    image: &'a str,
    prompts: &'a [String],
    return_masks: bool,
    return_annotated: bool,
    threshold: f64,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Kolosal API client.
#[derive(Debug, Clone)]
pub struct KolosalClient {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
}

impl KolosalClient {
    /// Create a new Kolosal client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Result<Self, AiError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
        })
    }

    /// Detect objects matching `prompts` in a base64-encoded frame.
    pub async fn segment(
        &self,
        image_base64: &str,
        prompts: &[String],
    ) -> Result<DetectResponse, AiError> {
        let url = format!("{}/v1/segment/base64", self.base_url);
        let request = SegmentRequest {
            image: image_base64,
            prompts,
            return_masks: false,
            return_annotated: false,
            threshold: DETECTION_THRESHOLD,
        };

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let result: DetectResponse = Self::handle_response(response).await?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis(),
            detections = result.results.len(),
            "Kolosal segmentation finished"
        );
        Ok(result)
    }

    /// Run a chat completion and return the first choice's text.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = Self::handle_response(response).await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| AiError::UnexpectedResponse("no choices".into()))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error = response.text().await.unwrap_or_default();
        Err(AiError::Api {
            status: status.as_u16(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> KolosalClient {
        KolosalClient::new(server.uri(), "test-key", "test-model").unwrap()
    }

    #[tokio::test]
    async fn segment_sends_prompts_and_threshold() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/segment/base64"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "prompts": ["bottle"],
                "threshold": 0.5,
                "return_masks": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "results": [{"name": "bottle", "confidence": 0.8, "bbox": [0, 0, 10, 10]}],
                "image_size": [320, 240]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.segment("aGVsbG8=", &["bottle".into()]).await.unwrap();
        assert!(result.success);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].name, "bottle");
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  halo  "}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let text = client
            .chat(&[ChatMessage::user("hai")], 50, 0.5)
            .await
            .unwrap();
        assert_eq!(text, "halo");
    }

    #[tokio::test]
    async fn api_errors_carry_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.segment("x", &[]).await.unwrap_err();
        assert!(matches!(err, AiError::Api { status: 401, .. }));
    }
}
