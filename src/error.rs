use thiserror::Error;

/// Errors surfaced by the analysis core.
///
/// Degenerate audio (silence, noise, clips shorter than one frame) is not an
/// error: it flows through the pipeline and produces an empty result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// A configuration value violates its constraint.
    #[error("invalid config: `{param}` {reason}")]
    InvalidConfig { param: &'static str, reason: String },

    /// The input signal has no samples.
    #[error("empty signal: nothing to analyze")]
    EmptySignal,

    /// The signal itself is malformed (zero sample rate, non-finite samples).
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// The caller raised the cancellation flag.
    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub(crate) fn invalid_config(param: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidConfig {
            param,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
