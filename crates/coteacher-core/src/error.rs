use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoTeacherError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("No conversation to save or export")]
    EmptyConversation,

    #[error("Saved conversation not found: {0}")]
    NotFound(String),

    #[error("Template is missing values for: {}", missing.join(", "))]
    IncompleteTemplate { missing: Vec<String> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reply cancelled")]
    Cancelled,
}

impl CoTeacherError {
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CoTeacherError>;
