use crate::error::AudioError;
use crate::route::{AudioRoute, PortOverride};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCategory {
    PlayAndRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    VoiceChat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSessionSettings {
    pub category: AudioCategory,
    pub mode: AudioMode,
    pub default_to_speaker: bool,
    pub preferred_sample_rate: u32,
    pub preferred_io_buffer_duration: Duration,
}

/// Platform audio session: exclusive focus, routing and category configuration.
pub trait AudioSessionPlatform: Send + Sync + 'static {
    fn configure(&self, settings: &AudioSessionSettings) -> Result<(), AudioError>;

    /// Acquires (`true`) or releases (`false`) audio focus.
    fn set_active(&self, active: bool) -> Result<(), AudioError>;

    fn override_output_port(&self, port: PortOverride) -> Result<(), AudioError>;

    /// Read from the platform on every call.
    fn current_route(&self) -> Result<AudioRoute, AudioError>;
}
