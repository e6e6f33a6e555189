use crate::config::SilenceConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Decides when a run of quiet samples counts as finished audio.
#[derive(Debug)]
pub struct SilenceTracker {
    threshold: f64,
    hold: Duration,
    silent_since: Option<Instant>,
    reported: bool,
}

impl SilenceTracker {
    pub fn new(threshold: f64, hold: Duration) -> Self {
        Self {
            threshold,
            hold,
            silent_since: None,
            reported: false,
        }
    }

    /// Returns `true` once per stretch of silence lasting at least the hold duration.
    pub fn observe(&mut self, level: f64, now: Instant) -> bool {
        if level >= self.threshold {
            self.silent_since = None;
            self.reported = false;
            return false;
        }

        let since = *self.silent_since.get_or_insert(now);
        if !self.reported && now.duration_since(since) >= self.hold {
            self.reported = true;
            return true;
        }
        false
    }
}

/// Background timer polling an audio level and firing a callback when audio went quiet.
pub struct SilenceDetector {
    shutdown_token: CancellationToken,
    task: JoinHandle<()>,
}

impl SilenceDetector {
    pub fn spawn<P, Fut, S>(config: &SilenceConfig, probe: P, on_silence: S) -> Self
    where
        P: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<f64>> + Send + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        let shutdown_token = CancellationToken::new();
        let mut tracker = SilenceTracker::new(config.threshold, config.hold());
        let poll_interval = config.poll_interval();

        let token = shutdown_token.clone();
        let task = tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(poll_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::trace!("Silence detector cancelled");
                            break;
                        }
                        _ = interval.tick() => {
                            let Some(level) = probe().await else {
                                continue;
                            };
                            if tracker.observe(level, Instant::now()) {
                                tracing::debug!(?level, "Audio went silent");
                                on_silence();
                            }
                        }
                    }
                }
            }
            .instrument(tracing::Span::current()),
        );

        Self {
            shutdown_token,
            task,
        }
    }

    pub fn cancel(&self) {
        self.shutdown_token.cancel();
        self.task.abort();
    }
}

impl Drop for SilenceDetector {
    fn drop(&mut self) {
        self.cancel();
    }
}
