use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdpType {
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "pranswer")]
    ProvisionalAnswer,
    #[serde(rename = "answer")]
    Answer,
}

impl Display for SdpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::ProvisionalAnswer => write!(f, "pranswer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// An SDP blob together with its role in the offer/answer exchange.
///
/// Serializes to the same `{"type": .., "sdp": ..}` shape browsers use for
/// `RTCSessionDescriptionInit`, so it can be handed to a signaling transport as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    kind: SdpType,
    sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Answer, sdp)
    }

    pub fn provisional_answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::ProvisionalAnswer, sdp)
    }

    #[inline]
    pub fn kind(&self) -> SdpType {
        self.kind
    }

    #[inline]
    pub fn sdp(&self) -> &str {
        &self.sdp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IceCandidate {
    #[serde(rename = "candidate")]
    pub sdp: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: u16,
}

impl IceCandidate {
    pub fn new(sdp: impl Into<String>, sdp_mid: Option<String>, sdp_m_line_index: u16) -> Self {
        Self {
            sdp: sdp.into(),
            sdp_mid,
            sdp_m_line_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl IceConnectionState {
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Connected | IceConnectionState::Completed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveLocalProvisionalAnswer,
    HaveRemoteOffer,
    HaveRemoteProvisionalAnswer,
    Closed,
}

impl SignalingState {
    /// Anything other than `Stable` or `Closed` means an offer/answer round is still open.
    #[inline]
    pub fn is_negotiating(&self) -> bool {
        !matches!(self, SignalingState::Stable | SignalingState::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

impl Display for TrackKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Snapshot of a media track as the engine currently sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
    Stopped,
}

impl Direction {
    #[inline]
    pub fn receives(&self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }

    #[inline]
    pub fn sends(&self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransceiverId(pub usize);

impl Display for TransceiverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "transceiver#{}", self.0)
    }
}

/// Snapshot of a negotiated sender/receiver pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transceiver {
    pub id: TransceiverId,
    pub mid: Option<String>,
    pub kind: TrackKind,
    pub direction: Direction,
    pub sender_track: Option<Track>,
    pub receiver_track: Option<Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Which side created a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataChannelConfig {
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
    pub max_retransmit_time_ms: Option<u16>,
    pub negotiated: bool,
    pub id: Option<u16>,
    pub protocol: String,
}

impl Default for DataChannelConfig {
    fn default() -> Self {
        Self {
            ordered: true,
            max_retransmits: None,
            max_retransmit_time_ms: None,
            negotiated: false,
            id: None,
            protocol: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub data: Bytes,
    pub binary: bool,
}

impl DataMessage {
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            binary: true,
        }
    }

    pub fn text(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            binary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl From<&str> for IceServer {
    fn from(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub ice_servers: Vec<IceServer>,
    pub unified_plan: bool,
    pub continual_gathering: bool,
    pub dtls_srtp_key_agreement: bool,
}

impl ConnectionConfig {
    pub fn new(ice_servers: Vec<IceServer>) -> Self {
        Self {
            ice_servers,
            unified_plan: true,
            continual_gathering: true,
            dtls_srtp_key_agreement: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
}

impl MediaConstraints {
    pub fn receive_all() -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub typing_noise_detection: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            typing_noise_detection: false,
        }
    }
}

/// Subset of live statistics the coordinator consumes.
///
/// Audio levels use the linear `[0, 1]` scale of the `audioLevel` stats member.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsReport {
    pub inbound_audio_level: Option<f64>,
    pub outbound_audio_level: Option<f64>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}
