use crate::config::STATE_CHANGE_CHANNEL_CAPACITY;
use parley_engine::{IceConnectionState, IceGatheringState, SignalingState};
use std::time::SystemTime;
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    Signaling(SignalingState),
    IceConnection(IceConnectionState),
    IceGathering(IceGatheringState),
}

/// A single engine-reported transition together with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub update: StateUpdate,
    pub at: SystemTime,
}

/// Republishes engine state reports without coalescing.
///
/// Snapshots are kept in watch channels; every report, repeats included, is also sent
/// on a broadcast channel in the order it was recorded.
pub struct ConnectionStateTracker {
    signaling_tx: watch::Sender<SignalingState>,
    ice_tx: watch::Sender<IceConnectionState>,
    gathering_tx: watch::Sender<IceGatheringState>,
    changes_tx: broadcast::Sender<StateChange>,
}

impl ConnectionStateTracker {
    pub fn new() -> Self {
        Self {
            signaling_tx: watch::channel(SignalingState::Stable).0,
            ice_tx: watch::channel(IceConnectionState::New).0,
            gathering_tx: watch::channel(IceGatheringState::New).0,
            changes_tx: broadcast::channel(STATE_CHANGE_CHANNEL_CAPACITY).0,
        }
    }

    pub fn record(&self, update: StateUpdate) -> StateChange {
        match update {
            StateUpdate::Signaling(state) => {
                self.signaling_tx.send_replace(state);
            }
            StateUpdate::IceConnection(state) => {
                self.ice_tx.send_replace(state);
            }
            StateUpdate::IceGathering(state) => {
                self.gathering_tx.send_replace(state);
            }
        }

        let change = StateChange {
            update,
            at: SystemTime::now(),
        };
        tracing::trace!(?change, "Recorded state change");
        if self.changes_tx.send(change).is_err() {
            tracing::trace!("No subscribers for state change");
        }
        change
    }

    pub fn current_signaling_state(&self) -> SignalingState {
        *self.signaling_tx.borrow()
    }

    pub fn current_ice_state(&self) -> IceConnectionState {
        *self.ice_tx.borrow()
    }

    pub fn current_gathering_state(&self) -> IceGatheringState {
        *self.gathering_tx.borrow()
    }

    /// Subscribes to a broadcast channel emitting every recorded [`StateChange`].
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes_tx.subscribe()
    }

    /// Subscribes to a watch containing the last reported [`IceConnectionState`].
    pub fn subscribe_ice_state(&self) -> watch::Receiver<IceConnectionState> {
        self.ice_tx.subscribe()
    }
}

impl Default for ConnectionStateTracker {
    fn default() -> Self {
        Self::new()
    }
}
