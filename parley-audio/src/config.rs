use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_IO_BUFFER_DURATION_MS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub preferred_sample_rate: u32,
    pub io_buffer_duration_ms: u64,
    pub default_to_speaker: bool,
    /// Audio host to open devices on (desktop only). Falls back to the system default.
    pub host: Option<String>,
    pub output_device: Option<String>,
}

impl AudioConfig {
    #[inline]
    pub fn io_buffer_duration(&self) -> Duration {
        Duration::from_millis(self.io_buffer_duration_ms)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preferred_sample_rate: DEFAULT_SAMPLE_RATE,
            io_buffer_duration_ms: DEFAULT_IO_BUFFER_DURATION_MS,
            default_to_speaker: true,
            host: None,
            output_device: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AudioConfig = toml::from_str("default_to_speaker = false").unwrap();
        assert_eq!(
            config,
            AudioConfig {
                default_to_speaker: false,
                ..Default::default()
            }
        );
        assert_eq!(config.io_buffer_duration(), Duration::from_millis(5));
    }
}
