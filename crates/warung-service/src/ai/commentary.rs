//! Commentary ("kepo") generation for completed sales.
//!
//! The shopkeeper persona guesses what the customer is up to from the basket. Generation is
//! best-effort: callers log failures and carry on.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use warung_core::{CartError, Commentary, TransactionId};

use super::{AiError, ChatMessage, KolosalClient, SpeechClient};

const PERSONA: &str = "\
Kamu adalah penjaga warung Indonesia yang super kepo, nyinyir, dan ngeselin. \
Kamu suka nebak-nebak barang belanjaan customer lalu nyindir dengan lucu, \
pakai bahasa gaul Jakarta (lu/gue, dong, kali, wkwk).

Jawab HANYA dengan JSON valid:
{\"sentence\": \"kalimat singkat untuk ditampilkan\", \
\"tts\": \"kalimat yang sama dengan panduan prosodi untuk text-to-speech\"}

Untuk tts: panjangkan huruf vokal untuk penekanan (\"bangeeet\") dan tambahkan nada \
dalam kurung, misal (nada kepo), (nada nyindir), (nada kaget).
Sentence maksimal dua kalimat pendek, tanpa emoji.";

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.9;

/// Produces commentary for a finished sale.
#[async_trait]
pub trait CommentaryGenerator: Send + Sync {
    /// Generate commentary for a basket described as `"<name> (<quantity>)"` strings.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ExternalUnavailable` when no commentary could be produced.
    async fn generate(
        &self,
        items: &[String],
        transaction_id: TransactionId,
    ) -> Result<Commentary, CartError>;
}

/// Generator used when no chat backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommentary;

#[async_trait]
impl CommentaryGenerator for NoCommentary {
    async fn generate(
        &self,
        _items: &[String],
        _transaction_id: TransactionId,
    ) -> Result<Commentary, CartError> {
        Err(unavailable("kolosal", "chat backend not configured"))
    }
}

/// Chat-backed generator with optional speech rendering.
#[derive(Debug, Clone)]
pub struct AiCommentary {
    chat: KolosalClient,
    speech: Option<SpeechClient>,
    audio_dir: PathBuf,
}

impl AiCommentary {
    /// Create a generator. Without `speech`, commentary carries no audio.
    #[must_use]
    pub fn new(
        chat: KolosalClient,
        speech: Option<SpeechClient>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chat,
            speech,
            audio_dir: audio_dir.into(),
        }
    }

    async fn render_audio(
        &self,
        speech: &SpeechClient,
        text: &str,
        transaction_id: TransactionId,
    ) -> Result<String, AiError> {
        let audio = speech.synthesize(text).await?;

        let filename = audio_filename(transaction_id);
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::write(self.audio_dir.join(&filename), audio).await?;

        Ok(format!("/audio/{filename}"))
    }
}

#[async_trait]
impl CommentaryGenerator for AiCommentary {
    async fn generate(
        &self,
        items: &[String],
        transaction_id: TransactionId,
    ) -> Result<Commentary, CartError> {
        let messages = [
            ChatMessage::system(PERSONA),
            ChatMessage::user(format!("Barang dibeli: {}", items.join(", "))),
        ];

        let raw = self
            .chat
            .chat(&messages, MAX_TOKENS, TEMPERATURE)
            .await
            .map_err(|e| unavailable("kolosal", e))?;

        let mut commentary = parse_commentary(&raw)
            .ok_or_else(|| unavailable("kolosal", "reply was not commentary JSON"))?;

        if let Some(speech) = &self.speech {
            let text = commentary.tts.as_deref().unwrap_or(&commentary.sentence);
            match self.render_audio(speech, text, transaction_id).await {
                Ok(url) => commentary.audio_url = Some(url),
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        error = %e,
                        "Speech rendering failed, commentary has no audio"
                    );
                }
            }
        }

        Ok(commentary)
    }
}

/// File name of the rendered clip for a transaction.
#[must_use]
pub fn audio_filename(transaction_id: TransactionId) -> String {
    format!("kepo-{transaction_id}.mp3")
}

#[derive(Debug, Deserialize)]
struct RawCommentary {
    sentence: String,
    #[serde(default)]
    tts: Option<String>,
}

/// Parse the model reply, tolerating a surrounding markdown code fence.
fn parse_commentary(raw: &str) -> Option<Commentary> {
    let json = strip_code_fence(raw.trim());
    let parsed: RawCommentary = serde_json::from_str(json).ok()?;

    let sentence = parsed.sentence.trim().to_string();
    if sentence.is_empty() {
        return None;
    }
    Some(Commentary {
        sentence,
        tts: parsed
            .tts
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        audio_url: None,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let body = &text[start + 3..];
    let body = body.strip_prefix("json").unwrap_or(body);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn unavailable(service: &str, message: impl ToString) -> CartError {
    CartError::ExternalUnavailable {
        service: service.to_string(),
        message: message.to_string(),
    }
}
