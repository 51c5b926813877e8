use thiserror::Error;

use crate::ai::LlmError;

/// Failure of one user-initiated operation: a search, an insight, a resume
/// analysis or a job-posting parse. Each operation keeps its own error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoutError {
    #[error("AI service error: {0}")]
    Service(String),

    #[error("Could not parse job posting: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Persistence(String),
}

impl ScoutError {
    /// True for failures that came back from the AI collaborator.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, ScoutError::Service(_) | ScoutError::Parse(_))
    }
}

impl From<LlmError> for ScoutError {
    fn from(err: LlmError) -> Self {
        ScoutError::Service(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counts_as_service_failure() {
        assert!(ScoutError::Parse("x".into()).is_service_failure());
        assert!(ScoutError::Service("x".into()).is_service_failure());
        assert!(!ScoutError::Validation("x".into()).is_service_failure());
        assert!(!ScoutError::Persistence("x".into()).is_service_failure());
    }

    #[test]
    fn test_llm_error_becomes_service_error() {
        let err: ScoutError = LlmError::EmptyContent.into();
        assert!(matches!(err, ScoutError::Service(ref msg) if msg.contains("empty")));
    }
}
