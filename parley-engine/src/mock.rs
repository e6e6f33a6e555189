//! Scriptable in-memory engine for exercising the coordinator without a network.
//!
//! [`create`] returns the factory together with a [`MockHandle`] sharing its state. The
//! handle records every call made on the engine, can script failures and delays, and
//! injects engine events as if they originated from the remote peer.

use crate::error::EngineError;
use crate::event::{EngineEvent, EngineEvents};
use crate::facade::{EngineConnection, EngineDataChannel, MediaEngineFactory};
use crate::types::{
    AudioConstraints, ChannelOrigin, ConnectionConfig, DataChannelConfig, DataChannelState,
    DataMessage, Direction, IceCandidate, IceConnectionState, MediaConstraints, SdpType,
    SessionDescription, SignalingState, StatsReport, Track, TrackKind, Transceiver,
    TransceiverId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateConnection(ConnectionConfig),
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SdpType),
    SetRemoteDescription(SdpType),
    AddIceCandidate(IceCandidate),
    CreateAudioTrack(String),
    CreateVideoTrack(String),
    AddTrack {
        track_id: String,
        stream_ids: Vec<String>,
    },
    SetTrackEnabled {
        track_id: String,
        enabled: bool,
    },
    ClearSenderTrack(TransceiverId),
    RemoveTrack(TransceiverId),
    StopTransceiver(TransceiverId),
    StopCapture,
    CreateDataChannel {
        label: String,
        config: DataChannelConfig,
    },
    DataChannelSend(ChannelOrigin),
    DataChannelClose(ChannelOrigin),
    Statistics,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateConnection,
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    CreateAudioTrack,
    CreateVideoTrack,
    AddTrack,
    SetTrackEnabled,
    ClearSenderTrack,
    RemoveTrack,
    StopTransceiver,
    StopCapture,
    CreateDataChannel,
    DataChannelSend,
    DataChannelClose,
    Statistics,
    Close,
}

impl EngineCall {
    pub fn operation(&self) -> Operation {
        match self {
            EngineCall::CreateConnection(_) => Operation::CreateConnection,
            EngineCall::CreateOffer => Operation::CreateOffer,
            EngineCall::CreateAnswer => Operation::CreateAnswer,
            EngineCall::SetLocalDescription(_) => Operation::SetLocalDescription,
            EngineCall::SetRemoteDescription(_) => Operation::SetRemoteDescription,
            EngineCall::AddIceCandidate(_) => Operation::AddIceCandidate,
            EngineCall::CreateAudioTrack(_) => Operation::CreateAudioTrack,
            EngineCall::CreateVideoTrack(_) => Operation::CreateVideoTrack,
            EngineCall::AddTrack { .. } => Operation::AddTrack,
            EngineCall::SetTrackEnabled { .. } => Operation::SetTrackEnabled,
            EngineCall::ClearSenderTrack(_) => Operation::ClearSenderTrack,
            EngineCall::RemoveTrack(_) => Operation::RemoveTrack,
            EngineCall::StopTransceiver(_) => Operation::StopTransceiver,
            EngineCall::StopCapture => Operation::StopCapture,
            EngineCall::CreateDataChannel { .. } => Operation::CreateDataChannel,
            EngineCall::DataChannelSend(_) => Operation::DataChannelSend,
            EngineCall::DataChannelClose(_) => Operation::DataChannelClose,
            EngineCall::Statistics => Operation::Statistics,
            EngineCall::Close => Operation::Close,
        }
    }
}

fn scripted_error(operation: Operation, reason: &str) -> EngineError {
    match operation {
        Operation::CreateOffer => EngineError::CreateFailed(format!("offer: {reason}")),
        Operation::CreateAnswer => EngineError::CreateFailed(format!("answer: {reason}")),
        Operation::CreateAudioTrack | Operation::CreateVideoTrack => {
            EngineError::CreateFailed(format!("track: {reason}"))
        }
        Operation::CreateDataChannel => {
            EngineError::CreateFailed(format!("data channel: {reason}"))
        }
        Operation::SetLocalDescription | Operation::SetRemoteDescription => {
            EngineError::Rejected(reason.to_string())
        }
        _ => anyhow::anyhow!("{operation:?} failed: {reason}").into(),
    }
}

struct MockTransceiver {
    kind: TrackKind,
    direction: Direction,
    sender_track: Option<String>,
    receiver_track: Option<String>,
}

struct MockState {
    calls: Vec<EngineCall>,
    failures: HashMap<Operation, String>,
    reject_candidates: bool,
    delay: Option<Duration>,
    connect_delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
    events_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
    closed: bool,
    signaling: SignalingState,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    applied_candidates: Vec<IceCandidate>,
    descriptions_created: usize,
    tracks: HashMap<String, (TrackKind, bool)>,
    transceivers: Vec<MockTransceiver>,
    capturing: bool,
    local_channel: Option<Arc<MockDataChannel>>,
    sent: Vec<(ChannelOrigin, DataMessage)>,
    stats: StatsReport,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failures: HashMap::new(),
            reject_candidates: false,
            delay: None,
            connect_delay: None,
            in_flight: 0,
            max_in_flight: 0,
            events_tx: None,
            closed: false,
            signaling: SignalingState::Stable,
            local_description: None,
            remote_description: None,
            applied_candidates: Vec::new(),
            descriptions_created: 0,
            tracks: HashMap::new(),
            transceivers: Vec::new(),
            capturing: false,
            local_channel: None,
            sent: Vec::new(),
            stats: StatsReport::default(),
        }
    }
}

impl MockState {
    fn emit(&self, event: EngineEvent) {
        match &self.events_tx {
            Some(tx) => {
                if let Err(err) = tx.send(event) {
                    tracing::trace!(event = ?err.0, "No receiver for mock engine event");
                }
            }
            None => tracing::warn!(?event, "Mock engine event emitted before connection exists"),
        }
    }

    fn transition(&mut self, next: SignalingState) {
        if self.signaling != next {
            self.signaling = next;
            self.emit(EngineEvent::SignalingStateChanged(next));
        }
    }

    fn record(&mut self, call: EngineCall) -> Result<(), EngineError> {
        let operation = call.operation();
        tracing::trace!(?call, "Mock engine call");
        self.calls.push(call);
        if self.closed {
            return Err(EngineError::Closed);
        }
        if let Some(reason) = self.failures.get(&operation) {
            return Err(scripted_error(operation, reason));
        }
        Ok(())
    }

    fn transceiver_mut(&mut self, id: TransceiverId) -> Result<&mut MockTransceiver, EngineError> {
        self.transceivers
            .get_mut(id.0)
            .ok_or_else(|| EngineError::InvalidState(format!("unknown {id}")))
    }

    fn track(&self, id: &str, kind: TrackKind) -> Track {
        Track {
            id: id.to_string(),
            kind,
            enabled: self.tracks.get(id).is_none_or(|(_, enabled)| *enabled),
        }
    }

    fn snapshot(&self) -> Vec<Transceiver> {
        self.transceivers
            .iter()
            .enumerate()
            .map(|(index, transceiver)| Transceiver {
                id: TransceiverId(index),
                mid: Some(index.to_string()),
                kind: transceiver.kind,
                direction: transceiver.direction,
                sender_track: transceiver
                    .sender_track
                    .as_deref()
                    .map(|id| self.track(id, transceiver.kind)),
                receiver_track: transceiver
                    .receiver_track
                    .as_deref()
                    .map(|id| self.track(id, transceiver.kind)),
            })
            .collect()
    }
}

/// Creates a mock engine and the handle controlling it.
#[tracing::instrument(level = "info")]
pub fn create() -> (MockEngine, MockHandle) {
    let state = Arc::new(Mutex::new(MockState::default()));
    (
        MockEngine {
            state: Arc::clone(&state),
        },
        MockHandle { state },
    )
}

pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl MediaEngineFactory for MockEngine {
    type Connection = MockConnection;

    async fn create_connection(
        &self,
        config: ConnectionConfig,
    ) -> Result<(Self::Connection, EngineEvents), EngineError> {
        let connect_delay = {
            let mut state = self.state.lock();
            state.record(EngineCall::CreateConnection(config))?;
            state.connect_delay
        };
        if let Some(delay) = connect_delay {
            tokio::time::sleep(delay).await;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.state.lock().events_tx = Some(events_tx);
        Ok((
            MockConnection {
                state: Arc::clone(&self.state),
            },
            events_rx,
        ))
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    /// Keeps track of overlapping negotiation steps, optionally stretching each one.
    async fn negotiation_step(&self) {
        let delay = {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.delay
        };
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.state.lock().in_flight -= 1;
    }

    fn create_track(&self, call: EngineCall, id: &str, kind: TrackKind) -> Result<Track, EngineError> {
        let mut state = self.state.lock();
        state.record(call)?;
        if state.tracks.contains_key(id) {
            return Err(EngineError::InvalidState(format!("track {id} already exists")));
        }
        state.tracks.insert(id.to_string(), (kind, true));
        state.capturing = true;
        Ok(Track::new(id, kind))
    }
}

#[async_trait]
impl EngineConnection for MockConnection {
    async fn create_offer(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError> {
        self.state.lock().record(EngineCall::CreateOffer)?;
        self.negotiation_step().await;

        let mut state = self.state.lock();
        if state.closed {
            return Err(EngineError::Closed);
        }
        state.descriptions_created += 1;
        Ok(SessionDescription::offer(format!(
            "v=0\r\no=mock {} 0 IN IP4 127.0.0.1\r\na=recv-audio:{}\r\na=recv-video:{}\r\n",
            state.descriptions_created,
            constraints.offer_to_receive_audio,
            constraints.offer_to_receive_video,
        )))
    }

    async fn create_answer(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError> {
        self.state.lock().record(EngineCall::CreateAnswer)?;
        self.negotiation_step().await;

        let mut state = self.state.lock();
        match state.signaling {
            SignalingState::HaveRemoteOffer | SignalingState::HaveLocalProvisionalAnswer => {
                state.descriptions_created += 1;
                Ok(SessionDescription::answer(format!(
                    "v=0\r\no=mock {} 0 IN IP4 127.0.0.1\r\n",
                    state.descriptions_created
                )))
            }
            other => Err(EngineError::InvalidState(format!(
                "cannot create answer in {other:?}"
            ))),
        }
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .record(EngineCall::SetLocalDescription(description.kind()))?;
        self.negotiation_step().await;

        let mut state = self.state.lock();
        let next = match (description.kind(), state.signaling) {
            (SdpType::Offer, SignalingState::Stable | SignalingState::HaveLocalOffer) => {
                SignalingState::HaveLocalOffer
            }
            (
                SdpType::Answer,
                SignalingState::HaveRemoteOffer | SignalingState::HaveLocalProvisionalAnswer,
            ) => SignalingState::Stable,
            (
                SdpType::ProvisionalAnswer,
                SignalingState::HaveRemoteOffer | SignalingState::HaveLocalProvisionalAnswer,
            ) => SignalingState::HaveLocalProvisionalAnswer,
            (kind, current) => {
                return Err(EngineError::InvalidState(format!(
                    "cannot apply local {kind} in {current:?}"
                )));
            }
        };
        state.local_description = Some(description);
        state.transition(next);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .record(EngineCall::SetRemoteDescription(description.kind()))?;
        self.negotiation_step().await;

        let mut state = self.state.lock();
        let next = match (description.kind(), state.signaling) {
            (SdpType::Offer, SignalingState::Stable | SignalingState::HaveRemoteOffer) => {
                SignalingState::HaveRemoteOffer
            }
            (
                SdpType::Answer,
                SignalingState::HaveLocalOffer | SignalingState::HaveRemoteProvisionalAnswer,
            ) => SignalingState::Stable,
            (
                SdpType::ProvisionalAnswer,
                SignalingState::HaveLocalOffer | SignalingState::HaveRemoteProvisionalAnswer,
            ) => SignalingState::HaveRemoteProvisionalAnswer,
            (kind, current) => {
                return Err(EngineError::InvalidState(format!(
                    "cannot apply remote {kind} in {current:?}"
                )));
            }
        };
        state.remote_description = Some(description);
        state.transition(next);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> bool {
        let mut state = self.state.lock();
        if state
            .record(EngineCall::AddIceCandidate(candidate.clone()))
            .is_err()
        {
            return false;
        }
        if state.reject_candidates || state.remote_description.is_none() {
            return false;
        }
        state.applied_candidates.push(candidate);
        true
    }

    async fn create_audio_track(
        &self,
        track_id: &str,
        _constraints: &AudioConstraints,
    ) -> Result<Track, EngineError> {
        self.create_track(
            EngineCall::CreateAudioTrack(track_id.to_string()),
            track_id,
            TrackKind::Audio,
        )
    }

    async fn create_video_track(&self, track_id: &str) -> Result<Track, EngineError> {
        self.create_track(
            EngineCall::CreateVideoTrack(track_id.to_string()),
            track_id,
            TrackKind::Video,
        )
    }

    async fn add_track(
        &self,
        track_id: &str,
        stream_ids: &[String],
    ) -> Result<TransceiverId, EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::AddTrack {
            track_id: track_id.to_string(),
            stream_ids: stream_ids.to_vec(),
        })?;
        let (kind, _) = state
            .tracks
            .get(track_id)
            .copied()
            .ok_or_else(|| EngineError::InvalidState(format!("unknown track {track_id}")))?;
        state.transceivers.push(MockTransceiver {
            kind,
            direction: Direction::SendRecv,
            sender_track: Some(track_id.to_string()),
            receiver_track: None,
        });
        Ok(TransceiverId(state.transceivers.len() - 1))
    }

    async fn transceivers(&self) -> Vec<Transceiver> {
        self.state.lock().snapshot()
    }

    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::SetTrackEnabled {
            track_id: track_id.to_string(),
            enabled,
        })?;
        match state.tracks.get_mut(track_id) {
            Some((_, current)) => {
                *current = enabled;
                Ok(())
            }
            None => Err(EngineError::InvalidState(format!("unknown track {track_id}"))),
        }
    }

    async fn clear_sender_track(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::ClearSenderTrack(transceiver))?;
        state.transceiver_mut(transceiver)?.sender_track = None;
        Ok(())
    }

    async fn remove_track(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::RemoveTrack(transceiver))?;
        let transceiver = state.transceiver_mut(transceiver)?;
        transceiver.sender_track = None;
        transceiver.direction = match transceiver.direction {
            Direction::SendRecv => Direction::RecvOnly,
            Direction::SendOnly => Direction::Inactive,
            other => other,
        };
        Ok(())
    }

    async fn stop_transceiver(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::StopTransceiver(transceiver))?;
        state.transceiver_mut(transceiver)?.direction = Direction::Stopped;
        Ok(())
    }

    async fn stop_capture(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::StopCapture)?;
        state.capturing = false;
        Ok(())
    }

    async fn create_data_channel(
        &self,
        label: &str,
        config: &DataChannelConfig,
    ) -> Result<Arc<dyn EngineDataChannel>, EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::CreateDataChannel {
            label: label.to_string(),
            config: config.clone(),
        })?;
        let channel = Arc::new(MockDataChannel {
            label: label.to_string(),
            origin: ChannelOrigin::Local,
            ready_state: Mutex::new(DataChannelState::Connecting),
            shared: Arc::clone(&self.state),
        });
        state.local_channel = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn statistics(&self) -> Result<StatsReport, EngineError> {
        let mut state = self.state.lock();
        state.record(EngineCall::Statistics)?;
        Ok(state.stats)
    }

    async fn close(&self) -> Result<(), EngineError> {
        let local_channel = {
            let mut state = self.state.lock();
            state.record(EngineCall::Close)?;
            state.closed = true;
            state.signaling = SignalingState::Closed;
            state.capturing = false;
            state.local_channel.clone()
        };
        if let Some(channel) = local_channel {
            *channel.ready_state.lock() = DataChannelState::Closed;
        }
        Ok(())
    }
}

pub struct MockDataChannel {
    label: String,
    origin: ChannelOrigin,
    ready_state: Mutex<DataChannelState>,
    shared: Arc<Mutex<MockState>>,
}

impl MockDataChannel {
    fn set_state(&self, next: DataChannelState) {
        *self.ready_state.lock() = next;
        self.shared.lock().emit(EngineEvent::DataChannelStateChanged {
            origin: self.origin,
            state: next,
        });
    }
}

#[async_trait]
impl EngineDataChannel for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> DataChannelState {
        *self.ready_state.lock()
    }

    async fn send(&self, message: DataMessage) -> Result<(), EngineError> {
        let ready_state = self.ready_state();
        let mut state = self.shared.lock();
        state.record(EngineCall::DataChannelSend(self.origin))?;
        if ready_state != DataChannelState::Open {
            return Err(EngineError::InvalidState(format!(
                "data channel {} is {ready_state:?}",
                self.label
            )));
        }
        state.sent.push((self.origin, message));
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.shared
            .lock()
            .record(EngineCall::DataChannelClose(self.origin))?;
        self.set_state(DataChannelState::Closing);
        self.set_state(DataChannelState::Closed);
        Ok(())
    }
}

/// Test-side control over a [`MockEngine`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state
            .lock()
            .calls
            .iter()
            .map(EngineCall::operation)
            .collect()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Makes every following call of `operation` fail until [`MockHandle::succeed`].
    pub fn fail(&self, operation: Operation, reason: impl Into<String>) {
        self.state.lock().failures.insert(operation, reason.into());
    }

    pub fn succeed(&self, operation: Operation) {
        self.state.lock().failures.remove(&operation);
    }

    pub fn reject_candidates(&self, reject: bool) {
        self.state.lock().reject_candidates = reject;
    }

    /// Stretches every negotiation step so overlapping callers become observable.
    pub fn set_negotiation_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Stretches connection creation so work can race an in-flight start.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    /// Highest number of negotiation steps that were ever running at the same time.
    pub fn max_concurrent_negotiation_steps(&self) -> usize {
        self.state.lock().max_in_flight
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.state.lock().signaling
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().local_description.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().remote_description.clone()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.state.lock().applied_candidates.clone()
    }

    pub fn transceivers(&self) -> Vec<Transceiver> {
        self.state.lock().snapshot()
    }

    pub fn track_enabled(&self, track_id: &str) -> Option<bool> {
        self.state
            .lock()
            .tracks
            .get(track_id)
            .map(|(_, enabled)| *enabled)
    }

    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn set_stats(&self, stats: StatsReport) {
        self.state.lock().stats = stats;
    }

    pub fn sent_messages(&self) -> Vec<(ChannelOrigin, DataMessage)> {
        self.state.lock().sent.clone()
    }

    pub fn emit(&self, event: EngineEvent) {
        self.state.lock().emit(event);
    }

    pub fn set_ice_connection_state(&self, state: IceConnectionState) {
        self.emit(EngineEvent::IceConnectionStateChanged(state));
    }

    /// Completes the local data channel's SCTP handshake.
    pub fn open_local_channel(&self) {
        self.set_local_channel_state(DataChannelState::Open);
    }

    pub fn set_local_channel_state(&self, next: DataChannelState) {
        let channel = self.state.lock().local_channel.clone();
        match channel {
            Some(channel) => channel.set_state(next),
            None => tracing::warn!("No local data channel to update"),
        }
    }

    /// Announces a data channel opened by the remote peer.
    pub fn open_remote_channel(&self, label: &str) -> Arc<MockDataChannel> {
        let channel = Arc::new(MockDataChannel {
            label: label.to_string(),
            origin: ChannelOrigin::Remote,
            ready_state: Mutex::new(DataChannelState::Open),
            shared: Arc::clone(&self.state),
        });
        self.emit(EngineEvent::DataChannelOpened(channel.clone()));
        channel
    }

    pub fn receive_message(&self, origin: ChannelOrigin, message: DataMessage) {
        self.emit(EngineEvent::DataChannelMessage { origin, message });
    }

    /// Adds a transceiver receiving `track_id` from the remote peer.
    pub fn add_remote_track(&self, kind: TrackKind, track_id: &str) -> Track {
        let mut state = self.state.lock();
        state.tracks.insert(track_id.to_string(), (kind, true));
        state.transceivers.push(MockTransceiver {
            kind,
            direction: Direction::RecvOnly,
            sender_track: None,
            receiver_track: Some(track_id.to_string()),
        });
        let track = Track::new(track_id, kind);
        state.emit(EngineEvent::TrackAdded(track.clone()));
        track
    }
}
