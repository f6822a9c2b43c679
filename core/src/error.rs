use thiserror::Error;

/// A handler refused the request. Reported to the model as
/// `{"success": false, "error": ...}` rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
}

impl ToolFailure {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Anything a handler can end with: a reportable failure or a storage error
/// that must reach the caller.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Failure(#[from] ToolFailure),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Hard errors returned to whoever invoked the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid tool execution context: missing userId")]
    MissingIdentity,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
