//! In-memory [`AudioSessionPlatform`] recording every request made on it.

use crate::error::AudioError;
use crate::platform::{AudioSessionPlatform, AudioSessionSettings};
use crate::route::{AudioRoute, PortOverride};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    Configure(AudioSessionSettings),
    SetActive(bool),
    OverrideOutputPort(PortOverride),
}

#[derive(Debug)]
struct MockAudioState {
    calls: Vec<AudioCall>,
    deny_focus: bool,
    active: bool,
    port_override: PortOverride,
    route: AudioRoute,
}

#[derive(Debug)]
pub struct MockAudioPlatform {
    state: Mutex<MockAudioState>,
}

impl MockAudioPlatform {
    /// `route` is what the platform reports while no speaker override is in place.
    pub fn new(route: AudioRoute) -> Self {
        Self {
            state: Mutex::new(MockAudioState {
                calls: Vec::new(),
                deny_focus: false,
                active: false,
                port_override: PortOverride::None,
                route,
            }),
        }
    }

    pub fn deny_focus(&self, deny: bool) {
        self.state.lock().deny_focus = deny;
    }

    pub fn set_route(&self, route: AudioRoute) {
        self.state.lock().route = route;
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn port_override(&self) -> PortOverride {
        self.state.lock().port_override
    }
}

impl AudioSessionPlatform for MockAudioPlatform {
    fn configure(&self, settings: &AudioSessionSettings) -> Result<(), AudioError> {
        self.state
            .lock()
            .calls
            .push(AudioCall::Configure(settings.clone()));
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.calls.push(AudioCall::SetActive(active));
        if active && state.deny_focus {
            return Err(AudioError::FocusDenied(
                "another session holds audio focus".to_string(),
            ));
        }
        state.active = active;
        Ok(())
    }

    fn override_output_port(&self, port: PortOverride) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.calls.push(AudioCall::OverrideOutputPort(port));
        state.port_override = port;
        Ok(())
    }

    fn current_route(&self) -> Result<AudioRoute, AudioError> {
        let state = self.state.lock();
        Ok(match state.port_override {
            PortOverride::Speaker => AudioRoute::Speaker,
            PortOverride::None => state.route,
        })
    }
}
