// src/utils/error.rs
use thiserror::Error;

// Errors raised by the rate-limited gateway. Callers only need to know whether
// retrying could help; the gateway already did the retrying.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transient failure calling {target}: {reason}")]
    Transient { target: String, reason: String },

    #[error("Request to {target} failed: {reason}")]
    Fatal { target: String, reason: String },
}

impl GatewayError {
    pub fn transient(target: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::Transient { target: target.into(), reason: reason.into() }
    }

    pub fn fatal(target: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::Fatal { target: target.into(), reason: reason.into() }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }
}

#[derive(Error, Debug)]
pub enum EdinetError {
    #[error("EDINET request failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("EDINET API key is not configured")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Unexpected EDINET response: {0}")]
    Parse(String),

    #[error("Could not unpack structured package {doc_id}: {reason}")]
    Unpack { doc_id: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parsing error in {path}: {reason}")]
    Xml { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// Failures talking to the text-generation service. None of these escape the
// summarizer; they are folded into `SummaryOutcome::Unavailable`.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("text-generation service is not reachable: {0}")]
    ServiceUnreachable(String),

    #[error("text-generation request timed out after {0}s")]
    Timeout(u64),

    #[error("text-generation service returned HTTP {0}")]
    Http(reqwest::StatusCode),

    #[error("malformed text-generation response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("EDINET interaction failed: {0}")]
    Edinet(#[from] EdinetError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_kind_is_preserved_through_edinet_error() {
        let err: EdinetError = GatewayError::transient("documents.json", "timed out").into();
        match err {
            EdinetError::Gateway(inner) => assert!(inner.is_transient()),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(!GatewayError::fatal("documents.json", "HTTP 500").is_transient());
    }

    #[test]
    fn app_error_messages_name_the_failing_layer() {
        let err: AppError = EdinetError::MissingApiKey.into();
        assert_eq!(err.to_string(), "EDINET interaction failed: EDINET API key is not configured");
    }
}
