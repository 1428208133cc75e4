use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git command failed: {0}")]
    Git(String),

    #[error("ssh agent error: {0}")]
    Ssh(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
