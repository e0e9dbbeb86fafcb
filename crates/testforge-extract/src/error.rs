//! Error types for the extraction layer

/// Errors from response sanitization.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Response did not parse as JSON, or parsed without the key the
    /// caller requires. No lenient repair is attempted.
    #[error("malformed agent response: {reason}")]
    MalformedResponse { reason: String },
}

impl ExtractError {
    /// Build a malformed-response error
    #[inline]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}
