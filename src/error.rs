use thiserror::Error;

#[derive(Error, Debug)]
pub enum GstError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Translator executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to build command: {0}")]
    Build(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

pub type Result<T> = std::result::Result<T, GstError>;
