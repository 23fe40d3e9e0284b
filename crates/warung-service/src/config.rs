//! Service configuration.

use serde::Deserialize;
use std::path::Path;

const DEFAULT_KOLOSAL_API_URL: &str = "https://api.kolosal.ai";
const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com";
const DEFAULT_CHAT_MODEL: &str = "global.anthropic.claude-sonnet-4-5-20250929-v1:0";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:3001").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "data/warung").
    pub data_dir: String,

    /// Directory rendered commentary clips are written to and served from.
    pub audio_dir: String,

    /// Shop name printed on receipts.
    pub shop_name: String,

    /// Shop address printed on receipts.
    pub shop_address: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes. Frames arrive as base64 images.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Generate commentary in the background after a sale is finalized.
    pub auto_commentary: bool,

    /// Audio clips older than this are deleted.
    pub audio_max_age_minutes: u64,

    /// How often the audio directory is swept.
    pub audio_cleanup_interval_minutes: u64,

    /// Kolosal API URL (vision and chat).
    pub kolosal_api_url: String,

    /// Kolosal API key (optional; AI features are disabled without it).
    pub kolosal_api_key: Option<String>,

    /// Chat model used for commentary.
    pub kolosal_chat_model: String,

    /// `OpenAI` API URL (speech).
    pub openai_api_url: String,

    /// `OpenAI` API key (optional; commentary has no audio without it).
    pub openai_api_key: Option<String>,
}

/// Kolosal secrets file structure.
#[derive(Debug, Deserialize)]
struct KolosalSecrets {
    #[serde(default)]
    api_url: Option<String>,
    api_key: String,
    #[serde(default)]
    chat_model: Option<String>,
}

/// `OpenAI` secrets file structure.
#[derive(Debug, Deserialize)]
struct OpenAiSecrets {
    api_key: String,
    #[serde(default)]
    api_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (kolosal_api_url, kolosal_api_key, kolosal_chat_model) = load_kolosal_secrets();
        let (openai_api_url, openai_api_key) = load_openai_secrets();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            data_dir: env_or("DATA_DIR", defaults.data_dir),
            audio_dir: env_or("AUDIO_DIR", defaults.audio_dir),
            shop_name: env_or("SHOP_NAME", defaults.shop_name),
            shop_address: env_or("SHOP_ADDRESS", defaults.shop_address),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            auto_commentary: env_parse("AUTO_COMMENTARY", defaults.auto_commentary),
            audio_max_age_minutes: env_parse(
                "AUDIO_MAX_AGE_MINUTES",
                defaults.audio_max_age_minutes,
            ),
            audio_cleanup_interval_minutes: env_parse(
                "AUDIO_CLEANUP_INTERVAL_MINUTES",
                defaults.audio_cleanup_interval_minutes,
            ),
            kolosal_api_url: kolosal_api_url.unwrap_or(defaults.kolosal_api_url),
            kolosal_api_key,
            kolosal_chat_model: kolosal_chat_model.unwrap_or(defaults.kolosal_chat_model),
            openai_api_url: openai_api_url.unwrap_or(defaults.openai_api_url),
            openai_api_key,
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Load Kolosal secrets from file or environment.
fn load_kolosal_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/kolosal.json",
        "warung/.secrets/kolosal.json",
        "../.secrets/kolosal.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<KolosalSecrets>(path) {
            tracing::info!(path = %path, "Loaded Kolosal secrets from file");
            return (
                secrets.api_url,
                Some(secrets.api_key),
                secrets.chat_model,
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Kolosal secrets file not found, using environment variables");
    (
        std::env::var("KOLOSAL_API_URL").ok(),
        std::env::var("KOLOSAL_API_KEY").ok(),
        std::env::var("KOLOSAL_CHAT_MODEL").ok(),
    )
}

/// Load `OpenAI` secrets from file or environment.
fn load_openai_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/openai.json",
        "warung/.secrets/openai.json",
        "../.secrets/openai.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<OpenAiSecrets>(path) {
            tracing::info!(path = %path, "Loaded OpenAI secrets from file");
            return (secrets.api_url, Some(secrets.api_key));
        }
    }

    tracing::debug!("OpenAI secrets file not found, using environment variables");
    (
        std::env::var("OPENAI_API_URL").ok(),
        std::env::var("OPENAI_API_KEY").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".into(),
            data_dir: "data/warung".into(),
            audio_dir: "public/audio".into(),
            shop_name: "WARUNG DREAM HIGHER".into(),
            shop_address: "Jl. Dream Higher Hackathon Imphnen X Kolosal".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_seconds: 30,
            auto_commentary: true,
            audio_max_age_minutes: 30,
            audio_cleanup_interval_minutes: 10,
            kolosal_api_url: DEFAULT_KOLOSAL_API_URL.into(),
            kolosal_api_key: None,
            kolosal_chat_model: DEFAULT_CHAT_MODEL.into(),
            openai_api_url: DEFAULT_OPENAI_API_URL.into(),
            openai_api_key: None,
        }
    }
}
