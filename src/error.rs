// invokeai-bridge/src/error.rs
//! Error handling

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error, {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error, {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error, {0}")]
    Json(#[from] serde_json::Error),

    /// The model the user picked was flagged by the pickle scanner.
    #[error("selected model appears to contain malware, {0}")]
    SelectedModelUnsafe(String),
    #[error("model not found, {0}")]
    ModelNotFound(String),
    #[error("pickle scanner failed, {0}")]
    ScannerFailed(String),
    #[error("invalid config, {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
