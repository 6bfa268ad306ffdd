use thiserror::Error;

use crate::models::LanguageLabel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no extractor available for language: {0}")]
    NoExtractorAvailable(LanguageLabel),
}

/// A single failed call to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation provider is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Transport errors, HTTP 429/5xx and malformed payloads are worth
    /// another attempt; other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Transport(_) | GenerationError::Malformed(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Disabled | GenerationError::Cancelled => false,
        }
    }
}
