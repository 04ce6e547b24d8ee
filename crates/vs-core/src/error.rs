use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Attempting to set a value at {key} where {context_path} is undefined.")]
    UndefinedWriteTarget { key: String, context_path: String },
    #[error("No context is available to read {key} from.")]
    NoContextAvailable { key: String },
    #[error("Cannot set {key} on read-only {target}.")]
    NotSettable { key: String, target: String },
    #[error("Cannot set {key} on {target}.")]
    WriteFailed { key: String, target: String },
}

impl ScopeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UndefinedWriteTarget { .. } => "SCOPE_SET_UNDEFINED",
            Self::NoContextAvailable { .. } => "SCOPE_NO_CONTEXT",
            Self::NotSettable { .. } => "SCOPE_NOT_SETTABLE",
            Self::WriteFailed { .. } => "SCOPE_WRITE_FAILED",
        }
    }

    pub fn undefined_target(key: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self::UndefinedWriteTarget {
            key: key.into(),
            context_path: context_path.into(),
        }
    }
}
