use anyhow::Context;
use config::{Config, Environment, File};
use parley_audio::AudioConfig;
use parley_engine::{AudioConstraints, DataChannelConfig, IceServer, MediaConstraints};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const STATE_CHANGE_CHANNEL_CAPACITY: usize = 100;

/// What every offer and answer asks the remote peer to send.
pub const MEDIA_CONSTRAINTS: MediaConstraints = MediaConstraints {
    offer_to_receive_audio: true,
    offer_to_receive_video: true,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ice: IceConfig,
    pub data_channel: DataChannelSettings,
    pub media: MediaConfig,
    pub audio: AudioConfig,
    pub silence: SilenceConfig,
}

impl SessionConfig {
    /// Layers the built-in defaults, an optional TOML file and `PARLEY_*` environment
    /// variables (`__` separates nested keys, e.g. `PARLEY_DATA_CHANNEL__LABEL`).
    pub fn parse(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&SessionConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("parley")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build config")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize config")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataChannelSettings {
    pub label: String,
    pub protocol: String,
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
    pub max_retransmit_time_ms: Option<u16>,
    pub negotiated: bool,
    pub id: Option<u16>,
}

impl DataChannelSettings {
    pub fn channel_config(&self) -> DataChannelConfig {
        DataChannelConfig {
            ordered: self.ordered,
            max_retransmits: self.max_retransmits,
            max_retransmit_time_ms: self.max_retransmit_time_ms,
            negotiated: self.negotiated,
            id: self.id,
            protocol: self.protocol.clone(),
        }
    }
}

impl Default for DataChannelSettings {
    fn default() -> Self {
        Self {
            label: "oai-events".to_string(),
            protocol: "oai-events".to_string(),
            ordered: true,
            max_retransmits: None,
            max_retransmit_time_ms: None,
            negotiated: false,
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Media stream label shared by the local audio and video tracks.
    pub stream_id: String,
    pub audio_track_id: String,
    pub video_track_id: String,
    pub audio_constraints: AudioConstraints,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            stream_id: "stream".to_string(),
            audio_track_id: "audio0".to_string(),
            video_track_id: "video0".to_string(),
            audio_constraints: AudioConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    /// Normalized output level below which audio counts as silent.
    pub threshold: f64,
    /// How long the output has to stay silent before audio counts as finished.
    pub hold_ms: u64,
}

impl SilenceConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: 100,
            threshold: 0.1,
            hold_ms: 1_500,
        }
    }
}
