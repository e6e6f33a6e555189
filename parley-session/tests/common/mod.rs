#![allow(dead_code)]

use parking_lot::Mutex;
use parley_audio::error::AudioError;
use parley_audio::mock::MockAudioPlatform;
use parley_audio::AudioRoute;
use parley_engine::mock::{self, MockEngine, MockHandle};
use parley_engine::{
    ChannelOrigin, DataChannelState, DataMessage, IceCandidate, IceConnectionState,
    IceGatheringState, IceServer, SignalingState, Track,
};
use parley_session::config::SessionConfig;
use parley_session::error::SessionError;
use parley_session::{Session, SessionDelegate};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub const STUN_SERVER: &str = "stun:stun.example.com:19302";

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Signaling(SignalingState),
    IceConnection(IceConnectionState),
    IceGathering(IceGatheringState),
    LocalCandidate(IceCandidate),
    CandidatesRemoved(Vec<IceCandidate>),
    TrackAdded(Track),
    RemoteChannel(String, DataChannelState),
    ChannelState(ChannelOrigin, DataChannelState),
    Data(ChannelOrigin, DataMessage),
    RenegotiationNeeded,
    AudioReady(Result<(), String>),
    AudioCompletion,
    Error(String),
}

#[derive(Default)]
pub struct RecordingDelegate {
    recorded: Mutex<Vec<Recorded>>,
}

impl RecordingDelegate {
    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.recorded
            .lock()
            .iter()
            .filter_map(|recorded| match recorded {
                Recorded::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, recorded: Recorded) {
        self.recorded.lock().push(recorded);
    }
}

impl SessionDelegate for RecordingDelegate {
    fn on_signaling_state_changed(&self, state: SignalingState, _at: SystemTime) {
        self.push(Recorded::Signaling(state));
    }

    fn on_ice_connection_state_changed(&self, state: IceConnectionState, _at: SystemTime) {
        self.push(Recorded::IceConnection(state));
    }

    fn on_ice_gathering_state_changed(&self, state: IceGatheringState, _at: SystemTime) {
        self.push(Recorded::IceGathering(state));
    }

    fn on_local_candidate(&self, candidate: &IceCandidate) {
        self.push(Recorded::LocalCandidate(candidate.clone()));
    }

    fn on_local_candidates_removed(&self, candidates: &[IceCandidate]) {
        self.push(Recorded::CandidatesRemoved(candidates.to_vec()));
    }

    fn on_track_added(&self, track: &Track) {
        self.push(Recorded::TrackAdded(track.clone()));
    }

    fn on_remote_data_channel(&self, label: &str, state: DataChannelState) {
        self.push(Recorded::RemoteChannel(label.to_string(), state));
    }

    fn on_data_channel_state_changed(&self, origin: ChannelOrigin, state: DataChannelState) {
        self.push(Recorded::ChannelState(origin, state));
    }

    fn on_data_received(&self, origin: ChannelOrigin, message: &DataMessage) {
        self.push(Recorded::Data(origin, message.clone()));
    }

    fn on_renegotiation_needed(&self) {
        self.push(Recorded::RenegotiationNeeded);
    }

    fn on_audio_session_ready(&self, result: Result<(), &AudioError>) {
        self.push(Recorded::AudioReady(result.map_err(|err| format!("{err:?}"))));
    }

    fn on_audio_completion(&self) {
        self.push(Recorded::AudioCompletion);
    }

    fn on_error(&self, error: &SessionError) {
        self.push(Recorded::Error(format!("{error:?}")));
    }
}

pub struct Fixture {
    pub session: Session<MockEngine>,
    pub engine: MockHandle,
    pub audio: Arc<MockAudioPlatform>,
    pub delegate: Arc<RecordingDelegate>,
}

impl Fixture {
    pub fn new(config: SessionConfig) -> Self {
        let (engine, handle) = mock::create();
        let audio = Arc::new(MockAudioPlatform::new(AudioRoute::Earpiece));
        let session = Session::new(Arc::new(engine), config, audio.clone());
        let delegate = Arc::new(RecordingDelegate::default());
        session.set_delegate(&delegate);
        Self {
            session,
            engine: handle,
            audio,
            delegate,
        }
    }

    pub async fn started() -> Self {
        let fixture = Self::new(SessionConfig::default());
        fixture
            .session
            .start(vec![IceServer::from(STUN_SERVER)])
            .await
            .unwrap();
        fixture
    }

    /// Waits until the delegate has seen `expected`.
    pub async fn wait_for(&self, expected: &Recorded) {
        let delegate = Arc::clone(&self.delegate);
        eventually(|| delegate.recorded().contains(expected)).await;
    }
}

/// Polls `condition` until it holds, failing the test after a second.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

pub fn candidate(n: u8) -> IceCandidate {
    IceCandidate::new(
        format!("candidate:{n} 1 udp 2122260223 192.168.1.{n} 5000{n} typ host"),
        Some("0".to_string()),
        0,
    )
}
