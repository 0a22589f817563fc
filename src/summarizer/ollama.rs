// src/summarizer/ollama.rs
use crate::config::SummarizerConfig;
use crate::utils::error::SummaryError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// One generation call: system instruction plus user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// A local text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier recorded with cached summaries.
    fn model(&self) -> &str;

    /// Cheap reachability check; never errors.
    async fn is_available(&self) -> bool;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, SummaryError>;
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Extracts the generated text from a non-streaming `/api/generate` reply.
pub fn parse_generate_response(body: &str) -> Result<String, SummaryError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SummaryError::MalformedResponse(e.to_string()))?;

    if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
        return Err(SummaryError::MalformedResponse(format!("service error: {}", error)));
    }
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|r| r.to_string())
        .ok_or_else(|| SummaryError::MalformedResponse("no `response` field".to_string()))
}

/// Ollama HTTP client (`/api/tags` probe, `/api/generate`).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    probe_timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &SummarizerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout,
            probe_timeout: config.probe_timeout,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn classify(&self, err: reqwest::Error) -> SummaryError {
        if err.is_timeout() {
            SummaryError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            SummaryError::ServiceUnreachable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            SummaryError::MalformedResponse(err.to_string())
        } else {
            SummaryError::ServiceUnreachable(err.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!("Ollama probe returned HTTP {}", response.status());
                false
            }
            Err(e) => {
                tracing::debug!("Ollama probe failed: {}", e);
                false
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, SummaryError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                top_p: 0.9,
            },
        };

        tracing::info!("Requesting summary from {} ({} prompt chars)", self.model, request.prompt.chars().count());
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Http(status));
        }
        let text = response.text().await.map_err(|e| self.classify(e))?;
        parse_generate_response(&text)
    }
}
