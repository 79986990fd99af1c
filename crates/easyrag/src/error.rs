use thiserror::Error;

use easyrag_client::ClientError;
use easyrag_common::ModelType;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Register a {0} model first.")]
    MissingModel(ModelType),

    #[error(
        "The client has not been initialized for tool \"{0}\". Register it with a client before running it."
    )]
    MissingClient(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Model failed to produce a usable reply after {attempts} attempts")]
    ExhaustedAttempts { attempts: u32 },

    #[error("Maximum turns exceeded: {turns}")]
    MaxTurnsExceeded { turns: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
