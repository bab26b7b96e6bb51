//! Error types for the configuration and serialization boundary.
//!
//! Nothing inside a simulation tick returns an error: stale references and
//! missing collaborators short-circuit and log instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
