use parley_engine::error::EngineError;
use parley_engine::{DataChannelState, IceCandidate};
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl Display for NegotiationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NegotiationStep::CreateOffer => write!(f, "create offer"),
            NegotiationStep::CreateAnswer => write!(f, "create answer"),
            NegotiationStep::SetLocalDescription => write!(f, "set local description"),
            NegotiationStep::SetRemoteDescription => write!(f, "set remote description"),
        }
    }
}

/// Steps of [`crate::Session::close`] that can fail, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    DisableLocalTracks,
    StopCapture,
    CloseDataChannels,
    DeactivateAudio,
    ReleaseTransceivers,
    CloseConnection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub reason: String,
}

impl Display for TeardownFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.step, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("negotiation failed during {step}: {reason}")]
    NegotiationFailed {
        step: NegotiationStep,
        reason: String,
    },
    #[error("remote ICE candidate rejected: {}", .0.sdp)]
    CandidateRejected(IceCandidate),
    #[error("data channel not ready: {state:?}")]
    ChannelNotReady { state: DataChannelState },
    #[error("audio focus denied: {0}")]
    AudioFocusDenied(String),
    #[error("teardown finished with {} failure(s)", .0.len())]
    TeardownPartialFailure(Vec<TeardownFailure>),
    #[error("session not started")]
    NotStarted,
    #[error("session already started")]
    AlreadyStarted,
    #[error("session closed")]
    Closed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    pub(crate) fn negotiation(step: NegotiationStep, err: EngineError) -> Self {
        match err {
            EngineError::Closed => SessionError::Closed,
            err => SessionError::NegotiationFailed {
                step,
                reason: err.to_string(),
            },
        }
    }
}
