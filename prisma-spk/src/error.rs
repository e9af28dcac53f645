//! Error types for prisma-spk

use thiserror::Error;

/// Speech driver errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Speech synthesis capability unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
