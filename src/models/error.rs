//! Error types for glossfill.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad config, invalid input)
//! - I^B materialized: Infrastructure failures (network, timeout, API)
//! - K_i violated: Internal invariant violations (bugs)

use thiserror::Error;

/// Top-level error type for glossfill.
#[derive(Debug, Error)]
pub enum GlossfillError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Chat-completion API specific errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content too short: {len} chars (minimum {min})")]
    ContentTooShort { len: usize, min: usize },
}

impl GlossfillError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if another attempt against the API could succeed.
    ///
    /// Auth failures and config errors do not heal on retry; everything
    /// the network or the model can do differently next time does.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Api(ApiError::AuthenticationFailed)
        )
    }
}

/// Result type alias for glossfill.
pub type Result<T> = std::result::Result<T, GlossfillError>;
