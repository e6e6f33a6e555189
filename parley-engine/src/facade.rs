use crate::error::EngineError;
use crate::event::EngineEvents;
use crate::types::{
    AudioConstraints, ConnectionConfig, DataChannelConfig, DataChannelState, DataMessage,
    IceCandidate, MediaConstraints, SessionDescription, StatsReport, Track, Transceiver,
    TransceiverId,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Creates engine connections. One factory is constructed explicitly by the owner of the
/// process (or test fixture) and handed to every session that needs it.
#[async_trait]
pub trait MediaEngineFactory: Send + Sync + 'static {
    type Connection: EngineConnection;

    async fn create_connection(
        &self,
        config: ConnectionConfig,
    ) -> Result<(Self::Connection, EngineEvents), EngineError>;
}

/// The narrow set of primitives the coordinator drives on a single engine connection.
///
/// Every operation completes exactly once. Implementations must not assume the caller
/// serializes anything but negotiation steps.
#[async_trait]
pub trait EngineConnection: Send + Sync + 'static {
    async fn create_offer(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError>;

    async fn create_answer(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    /// Returns `false` if the engine refused the candidate.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> bool;

    async fn create_audio_track(
        &self,
        track_id: &str,
        constraints: &AudioConstraints,
    ) -> Result<Track, EngineError>;

    async fn create_video_track(&self, track_id: &str) -> Result<Track, EngineError>;

    /// Attaches a previously created local track, returning the transceiver carrying it.
    async fn add_track(
        &self,
        track_id: &str,
        stream_ids: &[String],
    ) -> Result<TransceiverId, EngineError>;

    async fn transceivers(&self) -> Vec<Transceiver>;

    async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<(), EngineError>;

    async fn clear_sender_track(&self, transceiver: TransceiverId) -> Result<(), EngineError>;

    async fn remove_track(&self, transceiver: TransceiverId) -> Result<(), EngineError>;

    async fn stop_transceiver(&self, transceiver: TransceiverId) -> Result<(), EngineError>;

    async fn stop_capture(&self) -> Result<(), EngineError>;

    async fn create_data_channel(
        &self,
        label: &str,
        config: &DataChannelConfig,
    ) -> Result<Arc<dyn EngineDataChannel>, EngineError>;

    async fn statistics(&self) -> Result<StatsReport, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait EngineDataChannel: Send + Sync + 'static {
    fn label(&self) -> &str;

    /// Live state, read from the engine at call time.
    fn ready_state(&self) -> DataChannelState;

    async fn send(&self, message: DataMessage) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}
