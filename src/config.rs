// src/config.rs
//! Explicit configuration values handed to each component's constructor.
//!
//! Only [`AppConfig::from_env`] touches process state; everything below it
//! receives plain values so tests can build components with fakes.

use std::path::PathBuf;
use std::time::Duration;

/// EDINET API v2 base URL.
pub const DEFAULT_EDINET_BASE_URL: &str = "https://api.edinet-fsa.go.jp/api/v2";
/// Local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Small local model used when `LLM_MODEL` is unset.
pub const DEFAULT_LLM_MODEL: &str = "gemma3:1b";

/// Retry / timeout settings for one [`Gateway`](crate::edinet::gateway::Gateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed cooldown added to every backoff delay.
    pub cooldown_floor: Duration,
    /// Unit of the exponential part: delay = 2^attempt * unit + floor.
    pub backoff_unit: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between two requests on the same gateway.
    pub min_interval: Duration,
}

impl GatewayConfig {
    /// Day-query settings: many small requests, short timeout.
    pub fn search() -> Self {
        Self {
            max_attempts: 3,
            cooldown_floor: Duration::from_secs(2),
            backoff_unit: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            min_interval: Duration::from_millis(150),
        }
    }

    /// Document download settings: few large payloads.
    pub fn download() -> Self {
        Self {
            max_attempts: 3,
            cooldown_floor: Duration::from_secs(5),
            backoff_unit: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            min_interval: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub search: GatewayConfig,
    pub download: GatewayConfig,
    /// Where renderings and unpacked packages are written.
    pub work_dir: PathBuf,
}

impl ArchiveConfig {
    pub fn new(api_key: Option<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_EDINET_BASE_URL.to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            search: GatewayConfig::search(),
            download: GatewayConfig::download(),
            work_dir: work_dir.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Per-section character cap applied after normalization.
    pub max_section_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self { max_section_chars: 10_000 }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub service_url: String,
    pub model: String,
    /// Bound on the single generation call.
    pub timeout: Duration,
    /// Bound on the availability probe.
    pub probe_timeout: Duration,
    /// Approximate character budget of the summary.
    pub max_summary_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(3),
            max_summary_chars: 1_000,
            temperature: 0.3,
            max_tokens: 3_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    pub extractor: ExtractorConfig,
    pub summarizer: SummarizerConfig,
    pub cache_dir: PathBuf,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    ///
    /// Recognized variables: `EDINET_API_KEY`, `EDINET_BASE_URL`, `LLM_MODEL`,
    /// `OLLAMA_URL`, `CACHE_DIR`, `WORK_DIR`.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let work_dir = var("WORK_DIR").unwrap_or_else(|| "reports".to_string());
        let mut archive = ArchiveConfig::new(var("EDINET_API_KEY"), work_dir);
        if let Some(base_url) = var("EDINET_BASE_URL") {
            archive.base_url = base_url.trim_end_matches('/').to_string();
        }

        let mut summarizer = SummarizerConfig::default();
        if let Some(model) = var("LLM_MODEL") {
            summarizer.model = model;
        }
        if let Some(url) = var("OLLAMA_URL") {
            summarizer.service_url = url.trim_end_matches('/').to_string();
        }

        let cache_root = PathBuf::from(var("CACHE_DIR").unwrap_or_else(|| "cache".to_string()));

        Self {
            archive,
            extractor: ExtractorConfig::default(),
            summarizer,
            cache_dir: cache_root.join("edinet").join("summaries"),
        }
    }
}
