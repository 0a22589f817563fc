// src/summarizer/mod.rs
//! Turns a [`SectionSet`] into a short Japanese summary through a local
//! text-generation service, with a persistent cache in front of it.
//!
//! The summary is optional: every failure mode is reported as
//! [`SummaryOutcome::Unavailable`] instead of an error.

pub mod ollama;
pub mod prompt;

use crate::config::SummarizerConfig;
use crate::extractors::section::SectionSet;
use crate::storage::{CacheKey, CachedSummary, SummaryStore};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub use ollama::{GenerationRequest, OllamaClient, TextGenerator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The service did not answer the availability probe.
    ServiceDown,
    /// No narrative sections to summarize.
    NoText,
    /// Summarization was switched off by the caller.
    Disabled,
    /// The generation call failed; the cause is kept for display.
    Failed(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::ServiceDown => write!(f, "text-generation service is not running"),
            UnavailableReason::NoText => write!(f, "no narrative sections to summarize"),
            UnavailableReason::Disabled => write!(f, "summarization disabled"),
            UnavailableReason::Failed(cause) => write!(f, "generation failed: {}", cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    Summary { text: String, cached: bool },
    Unavailable { reason: UnavailableReason },
}

impl SummaryOutcome {
    fn unavailable(reason: UnavailableReason) -> Self {
        SummaryOutcome::Unavailable { reason }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SummaryOutcome::Summary { text, .. } => Some(text),
            SummaryOutcome::Unavailable { .. } => None,
        }
    }
}

pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn SummaryStore>,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SummaryStore>,
        config: SummarizerConfig,
    ) -> Self {
        Self { generator, store, config }
    }

    pub async fn summarize(&self, sections: &SectionSet, doc_id: &str) -> SummaryOutcome {
        if sections.is_empty() {
            return SummaryOutcome::unavailable(UnavailableReason::NoText);
        }

        let text = sections.concatenated();
        let key = CacheKey::for_text(doc_id, &text);

        match self.store.get(&key) {
            Ok(Some(entry)) => {
                tracing::info!("Using cached summary for {}", doc_id);
                return SummaryOutcome::Summary { text: entry.summary, cached: true };
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable cache entry for {}: {}", doc_id, e),
        }

        if !self.generator.is_available().await {
            tracing::warn!("Text-generation service is not reachable; skipping summary for {}", doc_id);
            return SummaryOutcome::unavailable(UnavailableReason::ServiceDown);
        }

        let request = prompt::build_request(&text, self.config.max_summary_chars);
        let raw = match self.generator.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Summary generation failed for {}: {}", doc_id, e);
                return SummaryOutcome::unavailable(UnavailableReason::Failed(e.to_string()));
            }
        };

        let summary = prompt::post_process(&raw, self.config.max_summary_chars);
        if summary.is_empty() {
            tracing::error!("Empty summary returned for {}", doc_id);
            return SummaryOutcome::unavailable(UnavailableReason::Failed("empty response".to_string()));
        }

        let entry = CachedSummary {
            doc_id: key.doc_id.clone(),
            fingerprint: key.fingerprint.clone(),
            summary: summary.clone(),
            model: self.generator.model().to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.put(&entry) {
            tracing::warn!("Could not cache summary for {}: {}", doc_id, e);
        }

        tracing::info!("Summary generated for {} ({} chars)", doc_id, summary.chars().count());
        SummaryOutcome::Summary { text: summary, cached: false }
    }
}
