use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub chat: ChatConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            ollama: OllamaConfig::from_env(),
            openai: OpenAiConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            index: IndexConfig::from_env(),
            chat: ChatConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  ollama:     url={}, model={}", self.ollama.url, self.ollama.model);
        tracing::info!(
            "  openai:     model={}, configured={}",
            self.openai.model,
            self.openai.is_configured()
        );
        tracing::info!(
            "  embedding:  provider={}, dimensions={}",
            self.embedding.provider,
            self.embedding.dimensions
        );
        tracing::info!("  index:      data_dir={}", self.index.data_dir.display());
        tracing::info!(
            "  chat:       temperature={}, max_tokens={}, max_iterations={}",
            self.chat.temperature,
            self.chat.max_tokens,
            self.chat.max_iterations
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "ollama": { "url": self.ollama.url, "model": self.ollama.model },
            "openai": { "model": self.openai.model, "configured": self.openai.is_configured() },
            "embedding": {
                "provider": self.embedding.provider,
                "dimensions": self.embedding.dimensions,
            },
            "index": { "data_dir": self.index.data_dir },
            "chat": {
                "temperature": self.chat.temperature,
                "max_tokens": self.chat.max_tokens,
                "max_input_len": self.chat.max_input_len,
                "max_iterations": self.chat.max_iterations,
                "retrieval_k": self.chat.retrieval_k,
            },
        })
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub embedding_model: String,
}

impl OllamaConfig {
    fn from_env() -> Self {
        Self {
            url: env_or("OLLAMA_URL", "http://localhost:11434"),
            model: env_or("OLLAMA_MODEL", "llama3.2"),
            embedding_model: env_or("OLLAMA_EMBEDDING_MODEL", "nomic-embed-text"),
        }
    }
}

// ── OpenAI-compatible backend ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl OpenAiConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt("OPENAI_API_KEY"),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl EmbeddingConfig {
    fn from_env() -> Self {
        Self {
            provider: env_or("EMBEDDING_PROVIDER", "ollama"),
            dimensions: env_usize("EMBEDDING_DIMENSIONS", 768),
            batch_size: env_usize("EMBEDDING_BATCH_SIZE", 64),
        }
    }
}

// ── Vector index storage ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub data_dir: PathBuf,
}

impl IndexConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("INDEX_DATA_DIR", "data/index")),
        }
    }
}

// ── Chat / orchestration ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-message content cap enforced before any model work.
    pub max_input_len: usize,
    /// Tool loop re-invocation cap.
    pub max_iterations: u32,
    /// Chunks retrieved per knowledge-base question.
    pub retrieval_k: usize,
    pub chunk_max_size: usize,
    pub chunk_overlap: usize,
}

impl ChatConfig {
    fn from_env() -> Self {
        Self {
            temperature: env_f32("CHAT_TEMPERATURE", 0.7),
            max_tokens: env_u32("CHAT_MAX_TOKENS", 2048),
            max_input_len: env_usize("CHAT_MAX_INPUT_LENGTH", 10_000),
            max_iterations: env_u32("CHAT_MAX_ITERATIONS", 5),
            retrieval_k: env_usize("CHAT_RETRIEVAL_K", 3),
            chunk_max_size: env_usize("CHUNK_MAX_SIZE", 1000),
            chunk_overlap: env_usize("CHUNK_OVERLAP", 200),
        }
    }
}
