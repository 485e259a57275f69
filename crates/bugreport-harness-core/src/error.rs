//! Error taxonomy shared by every core component.
//!
//! Per-unit failures (one chunk, one summary segment) are reported through
//! these variants and then isolated by the caller; only total failure
//! reaches the application as an empty or `None` result.

/// Errors produced by the core pipeline and by provider implementations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The provider could not be reached, timed out, or is rate limiting.
    /// Retryable by the caller.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider refused the input (malformed or too large). Drives
    /// adaptive splitting inside the index builder.
    #[error("request rejected: {0}")]
    RequestRejected(String),

    /// No credentials were found for the provider.
    #[error("authentication missing: {0}")]
    AuthenticationMissing(String),

    /// The provider answered but the body could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Two vectors that must have equal length do not.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A persisted index could not be read back.
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// No implementation is registered for the requested provider.
    #[error("provider not configured: {provider}")]
    NotConfigured { provider: String },

    /// The configured hard cap on failed chunks was reached.
    #[error("too many failed chunks: {failed} (limit {limit})")]
    FailureLimitExceeded { failed: usize, limit: usize },

    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the index builder should retry this failure on smaller pieces.
    pub fn is_splittable(&self) -> bool {
        matches!(self, CoreError::RequestRejected(_))
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ProviderUnavailable(_))
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
