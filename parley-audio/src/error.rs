use cpal::{DevicesError, SupportedStreamConfigsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio focus denied: {0}")]
    FocusDenied(String),
    #[error("no active audio session")]
    NoActiveSession,
    #[error("audio device is not available")]
    DeviceNotAvailable,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Other(#[from] Box<anyhow::Error>),
}

impl From<anyhow::Error> for AudioError {
    fn from(err: anyhow::Error) -> Self {
        AudioError::Other(Box::new(err))
    }
}

impl From<DevicesError> for AudioError {
    fn from(e: DevicesError) -> Self {
        match e {
            DevicesError::BackendSpecific { err } => {
                tracing::debug!(?err, "Backend specific cpal devices error");
                anyhow::anyhow!(err.description).into()
            }
        }
    }
}

impl From<SupportedStreamConfigsError> for AudioError {
    fn from(e: SupportedStreamConfigsError) -> Self {
        use SupportedStreamConfigsError::*;
        match e {
            DeviceNotAvailable => AudioError::DeviceNotAvailable,
            InvalidArgument => AudioError::Unsupported("stream config query".to_string()),
            BackendSpecific { err } => {
                tracing::debug!(?err, "Backend specific cpal stream config error");
                anyhow::anyhow!(err.description).into()
            }
        }
    }
}
