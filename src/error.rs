//! Error types for Biblio Desk

use thiserror::Error;

/// Broad failure classes, used to decide how a failure is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, expired or rejected credentials. Never retried.
    Auth,
    /// Rejected locally before any request was sent
    Validation,
    /// The backend answered with an error, or could not be reached
    Backend,
    /// Local storage, configuration or programming errors
    Internal,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Backend { status: u16, detail: Option<String> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(_) => ErrorKind::Auth,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) | AppError::Backend { .. } | AppError::Http(_) | AppError::Decode(_) => {
                ErrorKind::Backend
            }
            AppError::Storage(_) | AppError::Config(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Text shown to the user. Backend `detail` messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend { detail: Some(detail), .. } => detail.clone(),
            AppError::Authentication(msg) | AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
