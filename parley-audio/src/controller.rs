use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::platform::{AudioCategory, AudioMode, AudioSessionPlatform, AudioSessionSettings};
use crate::route::{AudioRoute, PortOverride};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::instrument;

/// Acquires and releases audio focus around a call and switches the output port.
pub struct AudioRoutingController {
    platform: Arc<dyn AudioSessionPlatform>,
    config: AudioConfig,
    active: Mutex<bool>,
}

impl AudioRoutingController {
    pub fn new(platform: Arc<dyn AudioSessionPlatform>, config: AudioConfig) -> Self {
        Self {
            platform,
            config,
            active: Mutex::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock()
    }

    fn settings(&self) -> AudioSessionSettings {
        AudioSessionSettings {
            category: AudioCategory::PlayAndRecord,
            mode: AudioMode::VoiceChat,
            default_to_speaker: self.config.default_to_speaker,
            preferred_sample_rate: self.config.preferred_sample_rate,
            preferred_io_buffer_duration: self.config.io_buffer_duration(),
        }
    }

    /// Configures voice-chat routing and takes audio focus.
    ///
    /// Any platform failure is returned as [`AudioError::FocusDenied`]; the caller is
    /// expected to carry on with whatever routing the platform left in place.
    #[instrument(level = "debug", skip(self), err)]
    pub fn activate(&self) -> Result<(), AudioError> {
        let mut active = self.active.lock();
        if *active {
            tracing::trace!("Audio session already active");
            return Ok(());
        }

        let settings = self.settings();
        self.platform.configure(&settings).map_err(|err| {
            tracing::warn!(?err, "Failed to configure audio session");
            AudioError::FocusDenied(err.to_string())
        })?;
        self.platform.set_active(true).map_err(|err| {
            tracing::warn!(?err, "Failed to acquire audio focus");
            AudioError::FocusDenied(err.to_string())
        })?;
        *active = true;

        if settings.default_to_speaker
            && let Err(err) = self.platform.override_output_port(PortOverride::Speaker)
        {
            tracing::warn!(?err, "Failed to default output to speaker");
        }

        tracing::debug!(?settings, "Audio session active");
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    pub fn deactivate(&self) -> Result<(), AudioError> {
        let mut active = self.active.lock();
        if !*active {
            tracing::trace!("Audio session not active, nothing to release");
            return Ok(());
        }
        *active = false;
        self.platform.set_active(false)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub fn route_to_speaker(&self) -> Result<(), AudioError> {
        self.override_output(PortOverride::Speaker)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub fn route_to_default(&self) -> Result<(), AudioError> {
        self.override_output(PortOverride::None)
    }

    fn override_output(&self, port: PortOverride) -> Result<(), AudioError> {
        if !self.is_active() {
            tracing::warn!(?port, "No active audio session, ignoring output override");
            return Err(AudioError::NoActiveSession);
        }
        self.platform.override_output_port(port)
    }

    pub fn current_route(&self) -> Result<AudioRoute, AudioError> {
        self.platform.current_route()
    }
}
