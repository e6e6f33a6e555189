//! Desktop [`AudioSessionPlatform`] built on cpal.
//!
//! Desktop hosts have no notion of exclusive audio focus, so activating the session
//! means claiming an output device that can run at the preferred sample rate. The
//! speaker override switches to the first device that looks like built-in speakers.

use crate::error::AudioError;
use crate::platform::{AudioSessionPlatform, AudioSessionSettings};
use crate::route::{AudioRoute, PortOverride};
use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use tracing::instrument;

#[derive(Default)]
struct SessionState {
    settings: Option<AudioSessionSettings>,
    port_override: PortOverride,
    /// Name of the output device claimed while the session is active.
    active_device: Option<String>,
}

pub struct CpalAudioSession {
    preferred_host: Option<String>,
    preferred_device: Option<String>,
    state: Mutex<SessionState>,
}

impl CpalAudioSession {
    pub fn new(preferred_host: Option<String>, preferred_device: Option<String>) -> Self {
        Self {
            preferred_host,
            preferred_device,
            state: Mutex::new(SessionState::default()),
        }
    }

    #[instrument(level = "trace")]
    fn select_host(preferred_host: Option<&str>) -> cpal::Host {
        let hosts = cpal::available_hosts();

        if let Some(name) = preferred_host {
            if let Some(id) = hosts.iter().find(|id| id.name().eq_ignore_ascii_case(name)) {
                tracing::trace!(?id, "Selected preferred audio host");
                return cpal::host_from_id(*id).unwrap_or(cpal::default_host());
            }
            if let Some(id) = hosts
                .iter()
                .find(|id| id.name().to_lowercase().contains(&name.to_lowercase()))
            {
                tracing::trace!(?id, "Selected preferred audio host (based on substring match)");
                return cpal::host_from_id(*id).unwrap_or(cpal::default_host());
            }
        }

        tracing::trace!("Selected default audio host");
        cpal::default_host()
    }

    fn supports_sample_rate(device: &cpal::Device, sample_rate: u32) -> Result<bool, AudioError> {
        Ok(device.supported_output_configs()?.any(|range| {
            range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
        }))
    }

    /// Picks the output device for `port`, preferring devices that run at `sample_rate`.
    #[instrument(level = "trace", skip(self), err)]
    fn select_output(&self, port: PortOverride, sample_rate: u32) -> Result<String, AudioError> {
        let host = Self::select_host(self.preferred_host.as_deref());
        let devices: Vec<(cpal::Device, String)> = host
            .output_devices()?
            .filter_map(|device| device.name().ok().map(|name| (device, name)))
            .collect();

        let wanted = |name: &str| match port {
            PortOverride::Speaker => AudioRoute::classify(name) == AudioRoute::Speaker,
            PortOverride::None => self
                .preferred_device
                .as_deref()
                .is_some_and(|preferred| name.eq_ignore_ascii_case(preferred)),
        };

        let mut fallback = None;
        for (device, name) in &devices {
            if !wanted(name) {
                continue;
            }
            if Self::supports_sample_rate(device, sample_rate)? {
                tracing::trace!(?name, "Selected output device");
                return Ok(name.clone());
            }
            fallback.get_or_insert_with(|| name.clone());
        }
        if let Some(name) = fallback {
            tracing::warn!(?name, ?sample_rate, "Output device does not support preferred sample rate");
            return Ok(name);
        }

        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotAvailable)?;
        let name = device
            .name()
            .context("Failed to read default output device name")?;
        tracing::trace!(?name, "Selected default output device");
        Ok(name)
    }

    fn preferred_sample_rate(&self) -> u32 {
        self.state
            .lock()
            .settings
            .as_ref()
            .map(|settings| settings.preferred_sample_rate)
            .unwrap_or(crate::config::DEFAULT_SAMPLE_RATE)
    }
}

impl Debug for CpalAudioSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CpalAudioSession")
            .field("preferred_host", &self.preferred_host)
            .field("preferred_device", &self.preferred_device)
            .field("port_override", &state.port_override)
            .field("active_device", &state.active_device)
            .finish()
    }
}

impl AudioSessionPlatform for CpalAudioSession {
    #[instrument(level = "debug", skip(self), err)]
    fn configure(&self, settings: &AudioSessionSettings) -> Result<(), AudioError> {
        tracing::debug!(
            io_buffer = ?settings.preferred_io_buffer_duration,
            "IO buffer duration is chosen by the audio host"
        );
        self.state.lock().settings = Some(settings.clone());
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    fn set_active(&self, active: bool) -> Result<(), AudioError> {
        if !active {
            self.state.lock().active_device = None;
            return Ok(());
        }

        let port = self.state.lock().port_override;
        let device = self.select_output(port, self.preferred_sample_rate())?;
        tracing::debug!(?device, "Claimed output device");
        self.state.lock().active_device = Some(device);
        Ok(())
    }

    #[instrument(level = "debug", skip(self), err)]
    fn override_output_port(&self, port: PortOverride) -> Result<(), AudioError> {
        let claimed = self.state.lock().active_device.is_some();
        let device = if claimed {
            Some(self.select_output(port, self.preferred_sample_rate())?)
        } else {
            None
        };

        let mut state = self.state.lock();
        state.port_override = port;
        if device.is_some() {
            state.active_device = device;
        }
        Ok(())
    }

    fn current_route(&self) -> Result<AudioRoute, AudioError> {
        if let Some(device) = self.state.lock().active_device.as_deref() {
            return Ok(AudioRoute::classify(device));
        }

        let host = Self::select_host(self.preferred_host.as_deref());
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotAvailable)?;
        let name = device
            .name()
            .context("Failed to read default output device name")?;
        Ok(AudioRoute::classify(&name))
    }
}
