use thiserror::Error;

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("corruption: {0}")]
    Corruption(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
