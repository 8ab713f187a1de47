//! Error types for the test harness
//!
//! Every failure a case can hit is one variant of [`TestHarnessError`]:
//! - configuration errors are fatal for the whole invocation
//! - component, execution, session and timeout errors abort one case
//! - release errors collected while closing are attached to the primary
//!   failure through [`TestHarnessError::Suppressed`]

use std::io;

/// Main error type for test harness operations
#[derive(Debug, thiserror::Error)]
pub enum TestHarnessError {
    /// Invalid or conflicting configuration, detected before any case runs
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// IO error (file operations)
    #[error("IO error for '{path}': {message}")]
    IoError { message: String, path: String },

    /// Malformed component descriptor or failed provisioning action
    #[error("Component error for '{definition}': {message}")]
    ComponentError { message: String, definition: String },

    /// The engine rejected a statement
    #[error("Execution error: {message}{}", display_cause(.cause))]
    ExecutionError {
        message: String,
        statement: String,
        cause: Option<String>,
    },

    /// Engine session could not be opened or closed
    #[error("Session error: {message}")]
    SessionError { message: String },

    /// A deadline expired
    #[error("Timeout after {timeout_ms}ms during '{operation}': {message}")]
    TimeoutError {
        message: String,
        operation: String,
        timeout_ms: u64,
    },

    /// A primary failure plus errors raised while releasing resources
    #[error("{primary}{}", display_suppressed(.suppressed))]
    Suppressed {
        primary: Box<TestHarnessError>,
        suppressed: Vec<TestHarnessError>,
    },
}

fn display_cause(cause: &Option<String>) -> String {
    match cause {
        Some(s) => format!(" ({})", s),
        None => String::new(),
    }
}

fn display_suppressed(suppressed: &[TestHarnessError]) -> String {
    if suppressed.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = suppressed.iter().map(|e| e.to_string()).collect();
    format!(" [suppressed: {}]", joined.join("; "))
}

impl TestHarnessError {
    /// Build an IO error carrying the offending path
    pub fn io(err: io::Error, path: impl AsRef<std::path::Path>) -> Self {
        TestHarnessError::IoError {
            message: err.to_string(),
            path: path.as_ref().display().to_string(),
        }
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        TestHarnessError::ConfigError {
            message: message.into(),
        }
    }

    /// Attach a release error to this one, keeping `self` as the primary
    pub fn merge(self, other: TestHarnessError) -> Self {
        match self {
            TestHarnessError::Suppressed {
                primary,
                mut suppressed,
            } => {
                suppressed.push(other);
                TestHarnessError::Suppressed {
                    primary,
                    suppressed,
                }
            }
            primary => TestHarnessError::Suppressed {
                primary: Box::new(primary),
                suppressed: vec![other],
            },
        }
    }

    /// Whether this error must stop the whole invocation
    pub fn is_fatal(&self) -> bool {
        matches!(self, TestHarnessError::ConfigError { .. })
    }
}

impl From<io::Error> for TestHarnessError {
    fn from(err: io::Error) -> Self {
        TestHarnessError::IoError {
            message: err.to_string(),
            path: String::new(),
        }
    }
}

impl From<serde_yaml::Error> for TestHarnessError {
    fn from(err: serde_yaml::Error) -> Self {
        TestHarnessError::ConfigError {
            message: format!("invalid engine configuration: {}", err),
        }
    }
}

/// Result type alias for test harness operations
pub type TestHarnessResult<T> = Result<T, TestHarnessError>;
