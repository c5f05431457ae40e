use thiserror::Error;

use crate::telegram::ApiMethod;

/// A Bot API call that did not complete successfully.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (connect, timeout, body read).
    /// The request URL is stripped because it embeds the bot token.
    #[error("{method}: network error: {source}")]
    Network {
        method: ApiMethod,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method}: unexpected HTTP status {status}: {body}")]
    Status {
        method: ApiMethod,
        status: u16,
        body: String,
    },

    #[error("{method}: malformed response: {reason}")]
    Malformed { method: ApiMethod, reason: String },

    /// HTTP 200 but the envelope said `ok: false`.
    #[error("{method}: rejected by Telegram: {description}")]
    Rejected {
        method: ApiMethod,
        description: String,
    },

    #[error("{method}: failed to encode payload: {source}")]
    Encode {
        method: ApiMethod,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    pub fn method(&self) -> Option<ApiMethod> {
        match self {
            Self::Network { method, .. }
            | Self::Status { method, .. }
            | Self::Malformed { method, .. }
            | Self::Rejected { method, .. }
            | Self::Encode { method, .. } => Some(*method),
            Self::Client(_) => None,
        }
    }
}

/// A caller-supplied payload, option set or setting the core refuses to act on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message has neither text nor an image")]
    EmptyMessage,

    #[error("conflicting keyboard directives: {0}")]
    ConflictingKeyboards(String),

    #[error("broadcast concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("broadcast delay range is inverted: min {min_ms}ms > max {max_ms}ms")]
    InvalidDelay { min_ms: u64, max_ms: u64 },
}
