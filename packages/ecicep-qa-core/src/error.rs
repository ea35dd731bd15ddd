//! QA harness error types.

use thiserror::Error;

/// Errors raised by the QA tooling.
///
/// Every variant aborts the current run; nothing in the workspace retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QaError {
    /// Required configuration value is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A RUN could not be produced or parsed
    #[error("RUN format error: {0}")]
    Format(String),

    /// Login page or credential post rejected
    #[error("Login failed with status {status}")]
    Auth { status: u16 },

    /// Form post to the registration endpoint rejected
    #[error("POST to {path} answered {status}: {body}")]
    Submission {
        path: String,
        status: u16,
        body: String,
    },

    /// Status-check endpoint answered something other than 200/404
    #[error("Category lookup for {run} returned status {status}: {body}")]
    Lookup {
        run: String,
        status: u16,
        body: String,
    },

    /// Report endpoint missing or with unexpected shape
    #[error("Report error: {0}")]
    Report(String),

    /// None of the identity columns exists in a table
    #[error("No RUN column found in {table} (tried {candidates})")]
    Schema { table: String, candidates: String },

    /// Row could not be presented as a mapping of named fields
    #[error("Expected a named-field row: {0}")]
    CursorMode(String),

    /// Persisted state does not match what the scenario submitted
    #[error("[{scenario}] {message}")]
    Verification { scenario: String, message: String },

    /// Network failure, including timeouts
    #[error("Transport error: {0}")]
    Transport(String),

    /// Database connection or query failure
    #[error("Database error: {0}")]
    Database(String),

    /// Run state machine asked for a transition it does not allow
    #[error("Invalid run state transition: {0}")]
    InvalidState(String),

    /// Error raised while a named scenario was running
    #[error("[{scenario}] {source}")]
    InScenario {
        scenario: String,
        source: Box<QaError>,
    },
}

impl QaError {
    /// Shorthand for a verification failure tagged with its scenario.
    pub fn verification(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        QaError::Verification {
            scenario: scenario.into(),
            message: message.into(),
        }
    }

    /// Tags the error with the scenario that raised it. Errors that already
    /// name a scenario are returned unchanged.
    pub fn in_scenario(self, scenario: &str) -> Self {
        match self {
            QaError::Verification { .. } | QaError::InScenario { .. } => self,
            other => QaError::InScenario {
                scenario: scenario.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with any scenario tag removed.
    pub fn root(&self) -> &QaError {
        match self {
            QaError::InScenario { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, QaError>;

/// Maximum number of response-body characters carried in an error.
pub const BODY_EXCERPT_CHARS: usize = 200;

/// First [`BODY_EXCERPT_CHARS`] characters of a response body.
pub fn body_excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
