use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine could not create {0}")]
    CreateFailed(String),
    #[error("engine rejected {0}")]
    Rejected(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("connection closed")]
    Closed,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] Box<anyhow::Error>),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Other(Box::new(err))
    }
}
