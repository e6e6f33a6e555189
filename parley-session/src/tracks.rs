use crate::config::MediaConfig;
use crate::error::SessionError;
use parley_engine::error::EngineError;
use parley_engine::{EngineConnection, Track, TrackKind, TransceiverId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::instrument;

pub struct TrackManager<C: EngineConnection> {
    connection: Arc<C>,
    media: MediaConfig,
    local: Mutex<Vec<(Track, TransceiverId)>>,
}

impl<C: EngineConnection> TrackManager<C> {
    pub fn new(connection: Arc<C>, media: MediaConfig) -> Self {
        Self {
            connection,
            media,
            local: Mutex::new(Vec::new()),
        }
    }

    /// Creates the local audio and video tracks and adds both under the shared stream id.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn attach_local_tracks(&self) -> Result<(), SessionError> {
        let audio = self
            .connection
            .create_audio_track(&self.media.audio_track_id, &self.media.audio_constraints)
            .await?;
        let video = self
            .connection
            .create_video_track(&self.media.video_track_id)
            .await?;

        let stream_ids = [self.media.stream_id.clone()];
        for track in [audio, video] {
            let transceiver = self.connection.add_track(&track.id, &stream_ids).await?;
            tracing::trace!(?track, %transceiver, "Attached local track");
            self.local.lock().push((track, transceiver));
        }
        Ok(())
    }

    pub fn local_tracks(&self) -> Vec<Track> {
        self.local
            .lock()
            .iter()
            .map(|(track, _)| track.clone())
            .collect()
    }

    /// Scans the current transceivers for tracks the remote peer is sending us.
    pub async fn remote_tracks(&self) -> Vec<Track> {
        self.connection
            .transceivers()
            .await
            .into_iter()
            .filter(|transceiver| transceiver.direction.receives())
            .filter_map(|transceiver| transceiver.receiver_track)
            .collect()
    }

    pub async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<(), SessionError> {
        Ok(self.connection.set_track_enabled(track_id, enabled).await?)
    }

    /// Sets `enabled` on every sender track of `kind`. Every track is attempted; the
    /// first failure is returned.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn set_local_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), SessionError> {
        let tracks = self
            .connection
            .transceivers()
            .await
            .into_iter()
            .filter_map(|transceiver| transceiver.sender_track)
            .filter(|track| track.kind == kind);
        self.set_all_enabled(tracks, enabled).await
    }

    /// Sets `enabled` on every receiver track of `kind`.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn set_remote_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), SessionError> {
        let tracks = self
            .connection
            .transceivers()
            .await
            .into_iter()
            .filter_map(|transceiver| transceiver.receiver_track)
            .filter(|track| track.kind == kind);
        self.set_all_enabled(tracks, enabled).await
    }

    async fn set_all_enabled(
        &self,
        tracks: impl Iterator<Item = Track>,
        enabled: bool,
    ) -> Result<(), SessionError> {
        let mut first_err = None;
        for track in tracks {
            if let Err(err) = self.connection.set_track_enabled(&track.id, enabled).await {
                tracing::warn!(?err, track = ?track.id, "Failed to toggle track");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// `true` while at least one local audio sender track is enabled.
    pub async fn is_audio_enabled(&self) -> bool {
        self.connection
            .transceivers()
            .await
            .into_iter()
            .filter_map(|transceiver| transceiver.sender_track)
            .any(|track| track.kind == TrackKind::Audio && track.enabled)
    }

    /// Clears, removes and stops the sender of every transceiver. All steps are
    /// attempted; failures are collected.
    #[instrument(level = "debug", skip(self))]
    pub async fn release_transceivers(&self) -> Vec<EngineError> {
        let mut errors = Vec::new();
        for transceiver in self.connection.transceivers().await {
            let id = transceiver.id;
            if let Err(err) = self.connection.clear_sender_track(id).await {
                tracing::warn!(?err, %id, "Failed to clear sender track");
                errors.push(err);
            }
            if let Err(err) = self.connection.remove_track(id).await {
                tracing::warn!(?err, %id, "Failed to remove track");
                errors.push(err);
            }
            if let Err(err) = self.connection.stop_transceiver(id).await {
                tracing::warn!(?err, %id, "Failed to stop transceiver");
                errors.push(err);
            }
        }
        self.local.lock().clear();
        errors
    }
}
