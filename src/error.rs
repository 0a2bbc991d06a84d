use std::error::Error as StdError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Initialization error: {message}")]
    InitializationError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("Configuration error for {parameter}: {message}")]
    ConfigurationError { message: String, parameter: String },

    #[error("Model error: {message}")]
    ModelError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("Processing error: {message}")]
    ProcessingError {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// No model is loaded; the request was refused before generation.
    #[error("Model not loaded")]
    NotReady,

    #[error("{message}")]
    GenerationFailed { message: String },

    #[error("Queue error (capacity {capacity}): {message}")]
    QueueError { message: String, capacity: usize },

    #[error("Build directory not found: {}", path.display())]
    StaticRootMissing { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub(crate) fn model(message: impl Into<String>, source: candle_core::Error) -> Self {
        ServiceError::ModelError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn processing(message: impl Into<String>) -> Self {
        ServiceError::ProcessingError {
            message: message.into(),
            source: None,
        }
    }

    /// Collapse any failure during a chat turn into the single kind callers see.
    pub(crate) fn into_generation_failure(self) -> Self {
        match self {
            ServiceError::NotReady | ServiceError::GenerationFailed { .. } => self,
            other => ServiceError::GenerationFailed {
                message: other.to_string(),
            },
        }
    }

    /// Whether this error means the service had no model to serve with.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ServiceError::NotReady)
    }
}

impl From<candle_core::Error> for ServiceError {
    fn from(err: candle_core::Error) -> Self {
        ServiceError::model("Candle operation failed", err)
    }
}
