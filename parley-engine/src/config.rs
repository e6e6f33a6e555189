pub const AUDIO_CLOCK_RATE: u32 = 48_000;
pub const AUDIO_CHANNELS: u16 = 2;
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

#[cfg(feature = "webrtc")]
pub use rtc::IntoRtc;

#[cfg(feature = "webrtc")]
mod rtc {
    use crate::types::{ConnectionConfig, IceServer};
    use webrtc::ice_transport::ice_server::RTCIceServer;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    pub trait IntoRtc<T> {
        fn into_rtc(self) -> T;
    }

    impl IntoRtc<RTCIceServer> for IceServer {
        fn into_rtc(self) -> RTCIceServer {
            RTCIceServer {
                urls: self.urls,
                username: self.username.unwrap_or_default(),
                credential: self.credential.unwrap_or_default(),
                ..Default::default()
            }
        }
    }

    impl IntoRtc<RTCConfiguration> for ConnectionConfig {
        fn into_rtc(self) -> RTCConfiguration {
            if self.continual_gathering {
                // webrtc-rs trickles every candidate it finds for the lifetime of the agent.
                tracing::trace!("Continual gathering requested");
            }
            if !self.unified_plan {
                tracing::warn!("Plan-B SDP is not available, negotiating with unified plan");
            }
            RTCConfiguration {
                ice_servers: self
                    .ice_servers
                    .into_iter()
                    .map(IntoRtc::into_rtc)
                    .collect(),
                ..Default::default()
            }
        }
    }
}
