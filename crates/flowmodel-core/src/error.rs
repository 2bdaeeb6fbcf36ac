use thiserror::Error;

/// Core error type for the flow model runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Model class is not registered
    #[error("Model class '{0}' not found. Please register it first.")]
    ModelClassNotFound(String),

    /// Action is not registered
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// Flow is not registered for the model class
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// Registration arguments are structurally invalid
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// A step handler failed
    #[error("Step execution error: {0}")]
    StepExecutionError(String),

    /// Flow application failed outside of a step handler
    #[error("Flow execution error: {0}")]
    FlowExecutionError(String),

    /// Model repository error
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The engine owning a model has been dropped
    #[error("Flow engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
