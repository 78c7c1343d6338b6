//! Stage-level error types.
//!
//! Every stage of the pipeline returns one of these instead of swallowing
//! failures; the resilience chain in [`crate::fetch`] and the ranker decide
//! what to recover from.

use thiserror::Error;

/// Failure while turning a source entry into content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// URL could not be parsed or rewritten (e.g. MediaWiki api.php).
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),

    /// Structured response was missing an expected field.
    #[error("response is missing `{0}`")]
    MissingField(&'static str),

    /// Body shape the strategy cannot interpret.
    #[error("unexpected response body: {0}")]
    UnexpectedBody(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => FetchError::Transport(err.to_string()),
        }
    }
}

/// Failure reported by an AI capability.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI capability is disabled")]
    Disabled,

    #[error("AI provider `{provider}` failed: {message}")]
    Provider { provider: String, message: String },
}

/// Failure building a source entry from configuration.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid source URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("source URL `{0}` has no host")]
    MissingHost(String),
}
