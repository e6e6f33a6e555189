use crate::facade::EngineDataChannel;
use crate::types::{
    ChannelOrigin, DataChannelState, DataMessage, IceCandidate, IceConnectionState,
    IceGatheringState, SignalingState, Track,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Ordered stream of everything the engine pushes at the coordinator.
pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

#[derive(Clone)]
pub enum EngineEvent {
    SignalingStateChanged(SignalingState),
    IceConnectionStateChanged(IceConnectionState),
    IceGatheringStateChanged(IceGatheringState),
    IceCandidateGenerated(IceCandidate),
    IceCandidatesRemoved(Vec<IceCandidate>),
    TrackAdded(Track),
    /// The remote endpoint opened its own data channel.
    DataChannelOpened(Arc<dyn EngineDataChannel>),
    DataChannelStateChanged {
        origin: ChannelOrigin,
        state: DataChannelState,
    },
    DataChannelMessage {
        origin: ChannelOrigin,
        message: DataMessage,
    },
    RenegotiationNeeded,
}

impl Debug for EngineEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::SignalingStateChanged(state) => {
                f.debug_tuple("SignalingStateChanged").field(state).finish()
            }
            EngineEvent::IceConnectionStateChanged(state) => {
                f.debug_tuple("IceConnectionStateChanged").field(state).finish()
            }
            EngineEvent::IceGatheringStateChanged(state) => {
                f.debug_tuple("IceGatheringStateChanged").field(state).finish()
            }
            EngineEvent::IceCandidateGenerated(candidate) => {
                f.debug_tuple("IceCandidateGenerated").field(candidate).finish()
            }
            EngineEvent::IceCandidatesRemoved(candidates) => {
                f.debug_tuple("IceCandidatesRemoved").field(candidates).finish()
            }
            EngineEvent::TrackAdded(track) => f.debug_tuple("TrackAdded").field(track).finish(),
            EngineEvent::DataChannelOpened(channel) => f
                .debug_struct("DataChannelOpened")
                .field("label", &channel.label())
                .field("state", &channel.ready_state())
                .finish(),
            EngineEvent::DataChannelStateChanged { origin, state } => f
                .debug_struct("DataChannelStateChanged")
                .field("origin", origin)
                .field("state", state)
                .finish(),
            EngineEvent::DataChannelMessage { origin, message } => f
                .debug_struct("DataChannelMessage")
                .field("origin", origin)
                .field("len", &message.data.len())
                .field("binary", &message.binary)
                .finish(),
            EngineEvent::RenegotiationNeeded => write!(f, "RenegotiationNeeded"),
        }
    }
}
