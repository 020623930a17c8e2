use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: &'static str },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Completion API returned no content")]
    EmptyResponse,

    #[error("Config error: {0}")]
    Config(String),
}

/// Coarse classification used to pick the apology shown in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotConfigured,
    Timeout,
    Quota,
    RateLimited,
    BadRequest,
    Other,
}

impl AssistantError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingApiKey { .. } | Self::Config(_) => FailureKind::NotConfigured,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Network(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Status { status: 401 | 403, .. } => FailureKind::NotConfigured,
            Self::Status { status: 402, .. } => FailureKind::Quota,
            Self::Status { status: 429, body } => {
                let body = body.to_ascii_lowercase();
                if body.contains("quota") || body.contains("billing") {
                    FailureKind::Quota
                } else {
                    FailureKind::RateLimited
                }
            }
            Self::Status { status: 400, .. } => FailureKind::BadRequest,
            _ => FailureKind::Other,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::EmptyResponse => true,
            Self::Status { status, .. } => {
                *status >= 500 || (*status == 429 && self.kind() == FailureKind::RateLimited)
            }
            Self::MissingApiKey { .. } | Self::Config(_) => false,
        }
    }
}
