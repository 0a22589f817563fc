// src/edinet/client.rs
use crate::config::ArchiveConfig;
use crate::edinet::gateway::Gateway;
use crate::edinet::models::{DocumentListResponse, FilingCandidate};
use crate::utils::error::{EdinetError, GatewayError};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

// EDINET API v2 authenticates through this header (lowercase for HeaderName).
const API_KEY_HEADER: &str = "ocp-apim-subscription-key";

/// Payload selector for `documents/{docID}?type=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// ZIP with the XBRL instance, inline-XBRL HTML and auditor files.
    StructuredPackage,
    /// Human-readable PDF.
    Rendering,
}

impl DocumentKind {
    pub const fn type_param(&self) -> &'static str {
        match self {
            DocumentKind::StructuredPackage => "1",
            DocumentKind::Rendering => "2",
        }
    }
}

/// Read access to the disclosure archive.
#[async_trait]
pub trait FilingArchive: Send + Sync {
    /// All documents submitted on `date`. A day without documents is an
    /// empty list, not an error.
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<FilingCandidate>, EdinetError>;

    /// Raw bytes of one document, `None` when the archive has no such payload.
    async fn download(
        &self,
        doc_id: &str,
        kind: DocumentKind,
    ) -> Result<Option<Vec<u8>>, EdinetError>;
}

/// Interprets a `documents.json` body.
///
/// EDINET sometimes answers HTTP 200 with an error envelope carrying a
/// `statusCode`; a 404 there means "no documents", anything else is fatal.
pub fn parse_document_list(body: &[u8]) -> Result<Vec<FilingCandidate>, EdinetError> {
    let response: DocumentListResponse = serde_json::from_slice(body)
        .map_err(|e| EdinetError::Parse(format!("documents.json: {}", e)))?;

    if let Some(code) = response.status_code.as_ref() {
        let code = match code {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if code == "404" {
            return Ok(Vec::new());
        }
        let message = response.message.unwrap_or_default();
        return Err(GatewayError::fatal("documents.json", format!("statusCode {}: {}", code, message)).into());
    }

    if let Some(meta) = response.metadata.as_ref() {
        match meta.status.as_deref() {
            None | Some("200") => {}
            Some("404") => return Ok(Vec::new()),
            Some(other) => {
                let message = meta.message.clone().unwrap_or_default();
                return Err(GatewayError::fatal("documents.json", format!("status {}: {}", other, message)).into());
            }
        }
        let count = meta.resultset.as_ref().and_then(|r| r.count).unwrap_or(0);
        tracing::debug!("documents.json reports {} result(s)", count);
    }

    Ok(response.results.unwrap_or_default())
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

/// HTTP implementation of [`FilingArchive`] against EDINET API v2.
pub struct EdinetClient {
    base_url: String,
    search: Gateway,
    download: Gateway,
}

impl EdinetClient {
    /// Fails with [`EdinetError::MissingApiKey`] when no key is configured.
    pub fn new(config: &ArchiveConfig) -> Result<Self, EdinetError> {
        let api_key = config.api_key.as_deref().ok_or(EdinetError::MissingApiKey)?;
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| EdinetError::Parse(format!("API key is not a valid header value: {}", e)))?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key_value);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, application/zip, application/pdf, */*"));

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search: Gateway::new("search", config.search.clone(), headers.clone())?,
            download: Gateway::new("download", config.download.clone(), headers)?,
        })
    }
}

#[async_trait]
impl FilingArchive for EdinetClient {
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<FilingCandidate>, EdinetError> {
        let url = format!("{}/documents.json", self.base_url);
        let query = [("date", date.format("%Y-%m-%d").to_string()), ("type", "2".to_string())];

        match self.search.get(&url, &query).await? {
            Some(body) => parse_document_list(&body),
            None => Ok(Vec::new()),
        }
    }

    async fn download(
        &self,
        doc_id: &str,
        kind: DocumentKind,
    ) -> Result<Option<Vec<u8>>, EdinetError> {
        let url = format!("{}/documents/{}", self.base_url, doc_id);
        let query = [("type", kind.type_param().to_string())];

        tracing::info!("Downloading {} (type={})", doc_id, kind.type_param());
        let Some(bytes) = self.download.get(&url, &query).await? else {
            return Ok(None);
        };

        // A JSON envelope in place of a binary payload is EDINET's way of
        // saying the document has no such rendition.
        if looks_like_json(&bytes) {
            tracing::warn!(
                "EDINET returned a JSON body instead of a document for {} (type={})",
                doc_id,
                kind.type_param()
            );
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}
