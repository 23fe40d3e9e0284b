//! `OpenAI` text-to-speech client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use super::AiError;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Renders text to mp3 audio.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SpeechClient {
    /// Create a new speech client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AiError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Synthesize `text` and return the mp3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AiError> {
        let url = format!("{}/v1/audio/speech", self.base_url);
        let request = SpeechRequest {
            model: "tts-1",
            input: text,
            voice: "nova",
            response_format: "mp3",
            speed: 0.9,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                error,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
