pub mod config;
mod data_channel;
mod delegate;
pub mod error;
mod session;
mod signaling;
mod silence;
mod state;
mod stats;
mod tracks;

pub use data_channel::DataChannelSupervisor;
pub use delegate::SessionDelegate;
pub use session::{Session, TeardownReport};
pub use signaling::{CandidateDisposition, CandidateFlush, SignalingCoordinator};
pub use silence::{SilenceDetector, SilenceTracker};
pub use state::{ConnectionStateTracker, StateChange, StateUpdate};
pub use stats::{AudioTrackType, normalize_audio_level};
pub use tracks::TrackManager;
