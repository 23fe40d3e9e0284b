//! AI collaborators: Kolosal vision and chat, `OpenAI` speech, and the commentary
//! generator built on them.
//!
//! Every collaborator is optional. Without credentials the service still runs; detection
//! reports no objects and finalized sales carry no commentary.

pub mod commentary;
pub mod kolosal;
pub mod speech;

pub use commentary::{AiCommentary, CommentaryGenerator, NoCommentary};
pub use kolosal::{ChatMessage, KolosalClient};
pub use speech::SpeechClient;

/// Error type for AI collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API returned an error.
    #[error("API error: {status} - {error}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        error: String,
    },

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Writing the rendered audio failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
