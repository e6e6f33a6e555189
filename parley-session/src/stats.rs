use parley_engine::StatsReport;

const QUIET_DB: f64 = -50.0;
const LOUD_DB: f64 = -10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTrackType {
    /// Local microphone, as sent to the remote peer.
    Input,
    /// Remote audio, as played out locally.
    Output,
}

impl AudioTrackType {
    pub(crate) fn level(&self, stats: &StatsReport) -> Option<f64> {
        match self {
            AudioTrackType::Input => stats.outbound_audio_level,
            AudioTrackType::Output => stats.inbound_audio_level,
        }
    }
}

/// Maps a linear audio level onto `[0, 1]` across the typical speech range of
/// -50 dBFS (silent) to -10 dBFS (loud).
pub fn normalize_audio_level(level: f64) -> f64 {
    if level.is_nan() || level <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * level.log10();
    ((db - QUIET_DB) / (LOUD_DB - QUIET_DB)).clamp(0.0, 1.0)
}
