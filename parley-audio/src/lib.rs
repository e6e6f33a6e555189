pub mod config;
mod controller;
pub mod device;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
mod platform;
mod route;

pub use config::AudioConfig;
pub use controller::AudioRoutingController;
pub use platform::{AudioCategory, AudioMode, AudioSessionPlatform, AudioSessionSettings};
pub use route::{AudioRoute, PortOverride};
