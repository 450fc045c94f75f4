use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Zero headlines survived aggregation.
    #[error("No data found: {0}")]
    NoDataFound(String),

    /// A single news provider failed. Absorbed at the adapter boundary.
    #[error("Upstream unavailable ({source_name}): {message}")]
    UpstreamUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Internal invariant violated (headline/label/row misalignment).
    #[error("Alignment error: {0}")]
    AlignmentError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The one-time sentiment model load failed; retried on the next request.
    #[error("Sentiment scorer unavailable: {0}")]
    ScorerUnavailable(String),
}

impl AnalysisError {
    pub fn upstream(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::UpstreamUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error should become a degraded (partial) response
    /// rather than a hard failure.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData(_)
                | AnalysisError::UpstreamUnavailable { .. }
                | AnalysisError::NoDataFound(_)
        )
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
