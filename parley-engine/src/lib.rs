pub mod config;
pub mod error;
mod event;
mod facade;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
#[cfg(feature = "webrtc")]
pub mod rtc;
mod types;

pub use event::EngineEvent;
pub use event::EngineEvents;
pub use facade::EngineConnection;
pub use facade::EngineDataChannel;
pub use facade::MediaEngineFactory;
pub use types::*;
