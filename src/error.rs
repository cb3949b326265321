use thiserror::Error;

/// Errors raised by grid generation, fitting, prediction and metric computation.
///
/// None of these are recovered internally: substituting a default would
/// corrupt the ranking of tuning candidates.
#[derive(Debug, Error)]
pub enum TunerError {
    /// Bad grid or tuning parameters (non-positive length, empty sampling
    /// range, more distinct base values requested than exist, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The target does not have exactly two class levels.
    #[error("unsupported problem shape: expected 2 class levels, found {levels}")]
    UnsupportedProblemShape { levels: usize },

    /// Zero denominator (or a missing class) while computing a metric.
    #[error("undefined metric: {0}")]
    UndefinedMetric(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The base trainer failed for one fit group.
    #[error("base model fit failed for {params}: {source}")]
    FitFailed {
        params: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("probability prediction failed: {0}")]
    PredictFailed(#[source] anyhow::Error),
}

impl TunerError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        TunerError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn undefined(msg: impl Into<String>) -> Self {
        TunerError::UndefinedMetric(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
