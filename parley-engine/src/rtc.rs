//! [`MediaEngineFactory`] backed by webrtc-rs.
//!
//! Audio and video capture live outside this crate: local tracks are sample tracks a
//! capture pipeline writes into, so audio processing constraints and capture control
//! are recorded here but carried out by whoever feeds the track.

use crate::config::{AUDIO_CHANNELS, AUDIO_CLOCK_RATE, IntoRtc, VIDEO_CLOCK_RATE};
use crate::error::EngineError;
use crate::event::{EngineEvent, EngineEvents};
use crate::facade::{EngineConnection, EngineDataChannel, MediaEngineFactory};
use crate::types::{
    AudioConstraints, ChannelOrigin, ConnectionConfig, DataChannelConfig, DataChannelState,
    DataMessage, Direction, IceCandidate, IceConnectionState, IceGatheringState,
    MediaConstraints, SdpType, SessionDescription, SignalingState, StatsReport, Track, TrackKind,
    Transceiver, TransceiverId,
};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::stats::StatsReportType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type EventSender = mpsc::UnboundedSender<EngineEvent>;

fn emit(events_tx: &EventSender, event: EngineEvent) {
    if let Err(err) = events_tx.send(event) {
        tracing::trace!(event = ?err.0, "No receiver for engine event");
    }
}

pub struct RtcEngineFactory {
    api: API,
}

impl RtcEngineFactory {
    #[instrument(level = "debug", err)]
    pub fn new() -> Result<Self, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("Failed to register default codecs")?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .context("Failed to register default interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

#[async_trait]
impl MediaEngineFactory for RtcEngineFactory {
    type Connection = RtcConnection;

    #[instrument(level = "debug", skip(self), err)]
    async fn create_connection(
        &self,
        config: ConnectionConfig,
    ) -> Result<(Self::Connection, EngineEvents), EngineError> {
        let peer_connection = Arc::new(
            self.api
                .new_peer_connection(config.into_rtc())
                .await
                .context("Failed to create peer connection")?,
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tracks = Arc::new(Mutex::new(TrackRegistry::default()));

        {
            let events_tx = events_tx.clone();
            peer_connection.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
                tracing::trace!(?state, "Signaling state changed");
                match signaling_state_from_rtc(state) {
                    Some(state) => emit(&events_tx, EngineEvent::SignalingStateChanged(state)),
                    None => tracing::trace!("Ignoring unspecified signaling state"),
                }
                Box::pin(async {})
            }));
        }

        {
            let events_tx = events_tx.clone();
            peer_connection.on_ice_connection_state_change(Box::new(
                move |state: RTCIceConnectionState| {
                    tracing::trace!(?state, "ICE connection state changed");
                    if let Some(state) = ice_connection_state_from_rtc(state) {
                        emit(&events_tx, EngineEvent::IceConnectionStateChanged(state));
                    }
                    Box::pin(async {})
                },
            ));
        }

        {
            let events_tx = events_tx.clone();
            peer_connection.on_ice_gathering_state_change(Box::new(
                move |state: RTCIceGathererState| {
                    tracing::trace!(?state, "ICE gathering state changed");
                    let state = match state {
                        RTCIceGathererState::New => Some(IceGatheringState::New),
                        RTCIceGathererState::Gathering => Some(IceGatheringState::Gathering),
                        RTCIceGathererState::Complete => Some(IceGatheringState::Complete),
                        _ => None,
                    };
                    if let Some(state) = state {
                        emit(&events_tx, EngineEvent::IceGatheringStateChanged(state));
                    }
                    Box::pin(async {})
                },
            ));
        }

        {
            let events_tx = events_tx.clone();
            peer_connection.on_ice_candidate(Box::new(
                move |candidate: Option<RTCIceCandidate>| {
                    tracing::trace!(?candidate, "ICE candidate gathered");
                    if let Some(candidate) = candidate {
                        match candidate.to_json() {
                            Ok(init) => emit(
                                &events_tx,
                                EngineEvent::IceCandidateGenerated(IceCandidate::new(
                                    init.candidate,
                                    init.sdp_mid,
                                    init.sdp_mline_index.unwrap_or_default(),
                                )),
                            ),
                            Err(err) => {
                                tracing::warn!(?err, "Failed to serialize ICE candidate");
                            }
                        }
                    }
                    Box::pin(async {})
                },
            ));
        }

        {
            let events_tx = events_tx.clone();
            let tracks = Arc::clone(&tracks);
            peer_connection.on_track(Box::new(
                move |track: Arc<TrackRemote>, _, _: Arc<RTCRtpTransceiver>| {
                    let id = track.id();
                    let kind = track_kind_from_rtc(track.kind());
                    tracing::trace!(?id, ?kind, "Remote track added");
                    if let Some(kind) = kind {
                        tracks.lock().remote_enabled.insert(id.clone(), true);
                        emit(&events_tx, EngineEvent::TrackAdded(Track::new(id, kind)));
                    }
                    Box::pin(async {})
                },
            ));
        }

        {
            let events_tx = events_tx.clone();
            peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                tracing::trace!(label = ?channel.label(), "Remote data channel announced");
                let channel = RtcDataChannel::observe(channel, ChannelOrigin::Remote, &events_tx);
                emit(&events_tx, EngineEvent::DataChannelOpened(Arc::new(channel)));
                Box::pin(async {})
            }));
        }

        {
            let events_tx = events_tx.clone();
            peer_connection.on_negotiation_needed(Box::new(move || {
                tracing::trace!("Negotiation needed");
                emit(&events_tx, EngineEvent::RenegotiationNeeded);
                Box::pin(async {})
            }));
        }

        Ok((
            RtcConnection {
                peer_connection,
                tracks,
                events_tx,
            },
            events_rx,
        ))
    }
}

struct LocalTrack {
    kind: TrackKind,
    enabled: bool,
    sample_track: Option<Arc<TrackLocalStaticSample>>,
}

#[derive(Default)]
struct TrackRegistry {
    local: HashMap<String, LocalTrack>,
    remote_enabled: HashMap<String, bool>,
    stopped: HashSet<usize>,
    capturing: bool,
}

pub struct RtcConnection {
    peer_connection: Arc<RTCPeerConnection>,
    tracks: Arc<Mutex<TrackRegistry>>,
    events_tx: EventSender,
}

impl RtcConnection {
    /// Sample track a capture pipeline writes encoded frames into, once attached.
    pub fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        let tracks = self.tracks.lock();
        let track = tracks.local.get(track_id)?;
        if !track.enabled || !tracks.capturing {
            return None;
        }
        track.sample_track.clone()
    }

    async fn transceiver(&self, id: TransceiverId) -> Result<Arc<RTCRtpTransceiver>, EngineError> {
        self.peer_connection
            .get_transceivers()
            .await
            .get(id.0)
            .cloned()
            .ok_or_else(|| EngineError::InvalidState(format!("unknown {id}")))
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn ensure_receiving(&self, constraints: &MediaConstraints) -> Result<(), EngineError> {
        let transceivers = self.peer_connection.get_transceivers().await;
        for (wanted, kind) in [
            (constraints.offer_to_receive_audio, RTPCodecType::Audio),
            (constraints.offer_to_receive_video, RTPCodecType::Video),
        ] {
            let receiving = transceivers.iter().any(|transceiver| {
                transceiver.kind() == kind
                    && matches!(
                        transceiver.direction(),
                        RTCRtpTransceiverDirection::Sendrecv | RTCRtpTransceiverDirection::Recvonly
                    )
            });
            if wanted && !receiving {
                tracing::trace!(?kind, "Adding receive-only transceiver");
                self.peer_connection
                    .add_transceiver_from_kind(
                        kind,
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Recvonly,
                            send_encodings: vec![],
                        }),
                    )
                    .await
                    .context("Failed to add receive-only transceiver")?;
            }
        }
        Ok(())
    }

    fn create_local_track(&self, track_id: &str, kind: TrackKind) -> Result<Track, EngineError> {
        let mut tracks = self.tracks.lock();
        if tracks.local.contains_key(track_id) {
            return Err(EngineError::InvalidState(format!(
                "local track {track_id} already exists"
            )));
        }
        tracks.local.insert(
            track_id.to_string(),
            LocalTrack {
                kind,
                enabled: true,
                sample_track: None,
            },
        );
        tracks.capturing = true;
        Ok(Track::new(track_id, kind))
    }
}

#[async_trait]
impl EngineConnection for RtcConnection {
    #[instrument(level = "trace", skip(self), err)]
    async fn create_offer(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError> {
        self.ensure_receiving(constraints).await?;
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|err| EngineError::CreateFailed(format!("offer: {err}")))?;
        session_description_from_rtc(offer)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn create_answer(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|err| EngineError::CreateFailed(format!("answer: {err}")))?;
        session_description_from_rtc(answer)
    }

    #[instrument(level = "trace", skip(self, description), fields(kind = %description.kind()), err)]
    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        let description = session_description_into_rtc(description)?;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(|err| EngineError::Rejected(format!("local description: {err}")))
    }

    #[instrument(level = "trace", skip(self, description), fields(kind = %description.kind()), err)]
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        let description = session_description_into_rtc(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(|err| EngineError::Rejected(format!("remote description: {err}")))
    }

    #[instrument(level = "trace", skip(self))]
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> bool {
        let init = RTCIceCandidateInit {
            candidate: candidate.sdp,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: Some(candidate.sdp_m_line_index),
            username_fragment: None,
        };
        match self.peer_connection.add_ice_candidate(init).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(?err, "Failed to add remote ICE candidate");
                false
            }
        }
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn create_audio_track(
        &self,
        track_id: &str,
        constraints: &AudioConstraints,
    ) -> Result<Track, EngineError> {
        tracing::debug!(
            ?constraints,
            "Audio processing is applied by the capture pipeline feeding this track"
        );
        self.create_local_track(track_id, TrackKind::Audio)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn create_video_track(&self, track_id: &str) -> Result<Track, EngineError> {
        self.create_local_track(track_id, TrackKind::Video)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn add_track(
        &self,
        track_id: &str,
        stream_ids: &[String],
    ) -> Result<TransceiverId, EngineError> {
        let kind = self
            .tracks
            .lock()
            .local
            .get(track_id)
            .map(|track| track.kind)
            .ok_or_else(|| EngineError::InvalidState(format!("unknown local track {track_id}")))?;

        let codec = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: AUDIO_CLOCK_RATE,
                channels: AUDIO_CHANNELS,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: VIDEO_CLOCK_RATE,
                ..Default::default()
            },
        };
        let stream_id = stream_ids.first().cloned().unwrap_or_default();
        let sample_track = Arc::new(TrackLocalStaticSample::new(
            codec,
            track_id.to_owned(),
            stream_id,
        ));

        let sender = self
            .peer_connection
            .add_track(Arc::clone(&sample_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .context("Failed to add track to peer connection")?;

        if let Some(track) = self.tracks.lock().local.get_mut(track_id) {
            track.sample_track = Some(sample_track);
        }

        for (index, transceiver) in self
            .peer_connection
            .get_transceivers()
            .await
            .iter()
            .enumerate()
        {
            if Arc::ptr_eq(&transceiver.sender().await, &sender) {
                return Ok(TransceiverId(index));
            }
        }

        Err(EngineError::InvalidState(format!(
            "no transceiver carries track {track_id}"
        )))
    }

    async fn transceivers(&self) -> Vec<Transceiver> {
        let mut snapshot = Vec::new();
        for (index, transceiver) in self
            .peer_connection
            .get_transceivers()
            .await
            .iter()
            .enumerate()
        {
            let Some(kind) = track_kind_from_rtc(transceiver.kind()) else {
                continue;
            };

            let sender_track_id = transceiver
                .sender()
                .await
                .track()
                .await
                .map(|track| track.id().to_string());
            let receiver_track_id = transceiver
                .receiver()
                .await
                .tracks()
                .await
                .first()
                .map(|track| track.id());

            let tracks = self.tracks.lock();
            let direction = if tracks.stopped.contains(&index) {
                Direction::Stopped
            } else {
                direction_from_rtc(transceiver.direction())
            };
            snapshot.push(Transceiver {
                id: TransceiverId(index),
                mid: transceiver.mid().map(|mid| mid.to_string()),
                kind,
                direction,
                sender_track: sender_track_id.map(|id| Track {
                    enabled: tracks.local.get(&id).is_none_or(|track| track.enabled),
                    id,
                    kind,
                }),
                receiver_track: receiver_track_id.map(|id| Track {
                    enabled: tracks.remote_enabled.get(&id).copied().unwrap_or(true),
                    id,
                    kind,
                }),
            });
        }
        snapshot
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<(), EngineError> {
        let mut tracks = self.tracks.lock();
        if let Some(track) = tracks.local.get_mut(track_id) {
            track.enabled = enabled;
            return Ok(());
        }
        if let Some(remote) = tracks.remote_enabled.get_mut(track_id) {
            *remote = enabled;
            return Ok(());
        }
        Err(EngineError::InvalidState(format!("unknown track {track_id}")))
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn clear_sender_track(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        self.transceiver(transceiver)
            .await?
            .sender()
            .await
            .replace_track(None)
            .await
            .context("Failed to clear sender track")?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn remove_track(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        let sender = self.transceiver(transceiver).await?.sender().await;
        self.peer_connection
            .remove_track(&sender)
            .await
            .context("Failed to remove track from peer connection")?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn stop_transceiver(&self, transceiver: TransceiverId) -> Result<(), EngineError> {
        self.transceiver(transceiver)
            .await?
            .stop()
            .await
            .context("Failed to stop transceiver")?;
        self.tracks.lock().stopped.insert(transceiver.0);
        Ok(())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn stop_capture(&self) -> Result<(), EngineError> {
        self.tracks.lock().capturing = false;
        Ok(())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn create_data_channel(
        &self,
        label: &str,
        config: &DataChannelConfig,
    ) -> Result<Arc<dyn EngineDataChannel>, EngineError> {
        let init = RTCDataChannelInit {
            ordered: Some(config.ordered),
            max_packet_life_time: config.max_retransmit_time_ms,
            max_retransmits: config.max_retransmits,
            protocol: (!config.protocol.is_empty()).then(|| config.protocol.clone()),
            negotiated: if config.negotiated { config.id } else { None },
        };
        let channel = self
            .peer_connection
            .create_data_channel(label, Some(init))
            .await
            .map_err(|err| EngineError::CreateFailed(format!("data channel {label}: {err}")))?;

        Ok(Arc::new(RtcDataChannel::observe(
            channel,
            ChannelOrigin::Local,
            &self.events_tx,
        )))
    }

    /// Byte counters only. The webrtc stats report carries no audio levels, so both level
    /// fields stay `None` and silence detection has nothing to sample on this engine.
    #[instrument(level = "trace", skip(self), err)]
    async fn statistics(&self) -> Result<StatsReport, EngineError> {
        let report = self.peer_connection.get_stats().await;
        let mut stats = StatsReport::default();
        for entry in report.reports.values() {
            match entry {
                StatsReportType::InboundRTP(inbound) => {
                    stats.bytes_received += inbound.bytes_received;
                }
                StatsReportType::OutboundRTP(outbound) => {
                    stats.bytes_sent += outbound.bytes_sent;
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn close(&self) -> Result<(), EngineError> {
        tracing::trace!("Closing peer connection");
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

pub struct RtcDataChannel {
    channel: Arc<RTCDataChannel>,
    origin: ChannelOrigin,
    events_tx: EventSender,
}

impl RtcDataChannel {
    fn observe(channel: Arc<RTCDataChannel>, origin: ChannelOrigin, events_tx: &EventSender) -> Self {
        {
            let events_tx = events_tx.clone();
            channel.on_open(Box::new(move || {
                tracing::trace!(?origin, "Data channel open");
                emit(
                    &events_tx,
                    EngineEvent::DataChannelStateChanged {
                        origin,
                        state: DataChannelState::Open,
                    },
                );
                Box::pin(async {})
            }));
        }

        {
            let events_tx = events_tx.clone();
            channel.on_close(Box::new(move || {
                tracing::trace!(?origin, "Data channel closed");
                emit(
                    &events_tx,
                    EngineEvent::DataChannelStateChanged {
                        origin,
                        state: DataChannelState::Closed,
                    },
                );
                Box::pin(async {})
            }));
        }

        {
            let events_tx = events_tx.clone();
            channel.on_message(Box::new(move |msg: DataChannelMessage| {
                emit(
                    &events_tx,
                    EngineEvent::DataChannelMessage {
                        origin,
                        message: DataMessage {
                            data: msg.data,
                            binary: !msg.is_string,
                        },
                    },
                );
                Box::pin(async {})
            }));
        }

        Self {
            channel,
            origin,
            events_tx: events_tx.clone(),
        }
    }
}

#[async_trait]
impl EngineDataChannel for RtcDataChannel {
    fn label(&self) -> &str {
        self.channel.label()
    }

    fn ready_state(&self) -> DataChannelState {
        match self.channel.ready_state() {
            RTCDataChannelState::Open => DataChannelState::Open,
            RTCDataChannelState::Closing => DataChannelState::Closing,
            RTCDataChannelState::Closed => DataChannelState::Closed,
            _ => DataChannelState::Connecting,
        }
    }

    #[instrument(level = "trace", skip(self, message), fields(origin = ?self.origin, len = message.data.len()), err)]
    async fn send(&self, message: DataMessage) -> Result<(), EngineError> {
        let sent = if message.binary {
            self.channel.send(&message.data).await
        } else {
            match String::from_utf8(message.data.to_vec()) {
                Ok(text) => self.channel.send_text(text).await,
                Err(_) => self.channel.send(&message.data).await,
            }
        };
        sent.map(|_| ()).context("Failed to send on data channel")?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self), fields(origin = ?self.origin), err)]
    async fn close(&self) -> Result<(), EngineError> {
        emit(
            &self.events_tx,
            EngineEvent::DataChannelStateChanged {
                origin: self.origin,
                state: DataChannelState::Closing,
            },
        );
        self.channel
            .close()
            .await
            .context("Failed to close data channel")?;
        Ok(())
    }
}

fn session_description_from_rtc(
    description: RTCSessionDescription,
) -> Result<SessionDescription, EngineError> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::ProvisionalAnswer,
        other => {
            return Err(EngineError::Unsupported(format!(
                "session description type {other}"
            )));
        }
    };
    Ok(SessionDescription::new(kind, description.sdp))
}

fn session_description_into_rtc(
    description: SessionDescription,
) -> Result<RTCSessionDescription, EngineError> {
    let sdp = description.sdp().to_owned();
    let parsed = match description.kind() {
        SdpType::Offer => RTCSessionDescription::offer(sdp),
        SdpType::Answer => RTCSessionDescription::answer(sdp),
        SdpType::ProvisionalAnswer => RTCSessionDescription::pranswer(sdp),
    };
    parsed.map_err(|err| EngineError::Rejected(format!("malformed SDP: {err}")))
}

fn signaling_state_from_rtc(state: RTCSignalingState) -> Option<SignalingState> {
    match state {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalProvisionalAnswer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemoteProvisionalAnswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        _ => None,
    }
}

fn ice_connection_state_from_rtc(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}

fn track_kind_from_rtc(kind: RTPCodecType) -> Option<TrackKind> {
    match kind {
        RTPCodecType::Audio => Some(TrackKind::Audio),
        RTPCodecType::Video => Some(TrackKind::Video),
        _ => None,
    }
}

fn direction_from_rtc(direction: RTCRtpTransceiverDirection) -> Direction {
    match direction {
        RTCRtpTransceiverDirection::Sendrecv => Direction::SendRecv,
        RTCRtpTransceiverDirection::Sendonly => Direction::SendOnly,
        RTCRtpTransceiverDirection::Recvonly => Direction::RecvOnly,
        _ => Direction::Inactive,
    }
}
