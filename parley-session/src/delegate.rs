use crate::error::SessionError;
use parking_lot::RwLock;
use parley_audio::error::AudioError;
use parley_engine::{
    ChannelOrigin, DataChannelState, DataMessage, IceCandidate, IceConnectionState,
    IceGatheringState, SignalingState, Track,
};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

/// Receives everything a session reports. Every method defaults to doing nothing.
///
/// Callbacks run on the session's event task; implementations should hand work off
/// rather than block.
pub trait SessionDelegate: Send + Sync + 'static {
    fn on_signaling_state_changed(&self, _state: SignalingState, _at: SystemTime) {}

    fn on_ice_connection_state_changed(&self, _state: IceConnectionState, _at: SystemTime) {}

    fn on_ice_gathering_state_changed(&self, _state: IceGatheringState, _at: SystemTime) {}

    /// A local candidate to forward to the remote peer.
    fn on_local_candidate(&self, _candidate: &IceCandidate) {}

    fn on_local_candidates_removed(&self, _candidates: &[IceCandidate]) {}

    fn on_track_added(&self, _track: &Track) {}

    fn on_remote_data_channel(&self, _label: &str, _state: DataChannelState) {}

    fn on_data_channel_state_changed(&self, _origin: ChannelOrigin, _state: DataChannelState) {}

    fn on_data_received(&self, _origin: ChannelOrigin, _message: &DataMessage) {}

    fn on_renegotiation_needed(&self) {}

    /// Outcome of activating or re-routing the audio session.
    fn on_audio_session_ready(&self, _result: Result<(), &AudioError>) {}

    /// Remote audio stayed silent for the configured hold duration.
    fn on_audio_completion(&self) {}

    fn on_error(&self, _error: &SessionError) {}
}

/// Non-owning registration of a [`SessionDelegate`]. Notifications go nowhere once the
/// delegate has been dropped.
#[derive(Clone, Default)]
pub(crate) struct DelegateHandle {
    inner: Arc<RwLock<Option<Weak<dyn SessionDelegate>>>>,
}

impl DelegateHandle {
    pub(crate) fn set(&self, delegate: Weak<dyn SessionDelegate>) {
        *self.inner.write() = Some(delegate);
    }

    pub(crate) fn notify(&self, f: impl FnOnce(&dyn SessionDelegate)) {
        let delegate = self.inner.read().as_ref().and_then(Weak::upgrade);
        match delegate {
            Some(delegate) => f(delegate.as_ref()),
            None => tracing::trace!("No delegate registered, dropping notification"),
        }
    }
}
