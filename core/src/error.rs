use serde::Serialize;

/// Boxed error returned by injected collaborators (agents, scorers, answerers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = TrustError> = std::result::Result<T, E>;

/// Everything the core can fail with.
///
/// `InvalidArgument` and `NotFound` are input errors raised at the point of
/// violation. The collaborator variants carry whatever the injected function
/// returned, unmodified. A review that fails is not an error: it surfaces as
/// a rejected [`crate::pipeline::PipelineResult`].
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("agent call failed: {0}")]
    Agent(#[source] BoxError),

    #[error("scorer failed on dimension '{dimension}': {source}")]
    Scorer {
        dimension: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("answerer failed: {0}")]
    Answerer(#[source] BoxError),
}

impl TrustError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            Self::NotFound(_) => codes::NOT_FOUND,
            Self::Agent(_) => codes::AGENT_FAILED,
            Self::Scorer { .. } => codes::SCORER_FAILED,
            Self::Answerer(_) => codes::ANSWERER_FAILED,
        }
    }

    /// Build the structured report for this error.
    pub fn report(&self) -> ErrorReport {
        let docs_hint = match self {
            Self::InvalidArgument(_) => None,
            Self::NotFound(_) => Some(
                "Expected a statement like 'confidence: 85%' or 'certainty 70%'.".to_string(),
            ),
            Self::Agent(_) | Self::Answerer(_) => {
                Some("Check the provider URL, model, and API key.".to_string())
            }
            Self::Scorer { .. } => {
                Some("Retry with the heuristic scorer to isolate the judge.".to_string())
            }
        };
        ErrorReport {
            error: self.code().to_string(),
            message: self.to_string(),
            docs_hint,
        }
    }
}

/// Structured error body, designed to be read by agents as well as humans.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorReport {
    /// Machine-readable error code (e.g. "invalid_argument", "not_found")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Hint about how to fix the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the crate and the CLI.
pub mod codes {
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const AGENT_FAILED: &str = "agent_failed";
    pub const SCORER_FAILED: &str = "scorer_failed";
    pub const ANSWERER_FAILED: &str = "answerer_failed";
}
