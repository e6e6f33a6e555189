use crate::config::SessionConfig;
use crate::data_channel::DataChannelSupervisor;
use crate::delegate::{DelegateHandle, SessionDelegate};
use crate::error::{SessionError, TeardownFailure, TeardownStep};
use crate::signaling::{CandidateDisposition, SignalingCoordinator};
use crate::silence::SilenceDetector;
use crate::state::{ConnectionStateTracker, StateChange, StateUpdate};
use crate::stats::{AudioTrackType, normalize_audio_level};
use crate::tracks::TrackManager;
use parking_lot::Mutex;
use parley_audio::error::AudioError;
use parley_audio::{AudioRoute, AudioRoutingController, AudioSessionPlatform};
use parley_engine::{
    ConnectionConfig, DataChannelState, DataMessage, EngineConnection, EngineEvent, EngineEvents,
    IceCandidate, IceConnectionState, IceGatheringState, IceServer, MediaEngineFactory,
    SessionDescription, SignalingState, Track, TrackKind,
};
use std::fmt::Display;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

/// Everything that went wrong while closing a session. Empty when teardown was clean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_result(self) -> Result<(), SessionError> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(SessionError::TeardownPartialFailure(self.failures))
        }
    }

    fn record<E: Display>(&mut self, step: TeardownStep, err: E) {
        tracing::warn!(?step, %err, "Teardown step failed");
        self.failures.push(TeardownFailure {
            step,
            reason: err.to_string(),
        });
    }
}

struct Active<C: EngineConnection> {
    connection: Arc<C>,
    signaling: SignalingCoordinator<C>,
    tracks: TrackManager<C>,
    channels: Arc<DataChannelSupervisor>,
    silence: Mutex<Option<SilenceDetector>>,
    shutdown_token: CancellationToken,
    event_task: JoinHandle<()>,
}

enum Phase<C: EngineConnection> {
    Idle,
    Starting,
    /// `close()` arrived while `start()` was still building. Start tears down what it
    /// built and hands the report to the waiting closer.
    Aborting(oneshot::Sender<TeardownReport>),
    Running(Arc<Active<C>>),
    Closed,
}

/// Settles the phase if `start` is dropped before it decided the outcome.
struct StartGuard<'a, C: EngineConnection> {
    phase: &'a Mutex<Phase<C>>,
    settled: bool,
}

impl<C: EngineConnection> Drop for StartGuard<'_, C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Starting => *phase = Phase::Idle,
            Phase::Aborting(_) => *phase = Phase::Closed,
            Phase::Idle | Phase::Running(_) | Phase::Closed => {}
        }
    }
}

enum CloseAction<C: EngineConnection> {
    Teardown(Arc<Active<C>>),
    AwaitStart(oneshot::Receiver<TeardownReport>),
    Nothing,
}

/// One peer-to-peer call: negotiation, media, the application data channel and audio
/// routing, torn down together by [`Session::close`].
pub struct Session<F: MediaEngineFactory> {
    factory: Arc<F>,
    config: SessionConfig,
    audio: Arc<AudioRoutingController>,
    tracker: Arc<ConnectionStateTracker>,
    delegate: DelegateHandle,
    phase: Mutex<Phase<F::Connection>>,
}

impl<F: MediaEngineFactory> Session<F> {
    pub fn new(
        factory: Arc<F>,
        config: SessionConfig,
        audio_platform: Arc<dyn AudioSessionPlatform>,
    ) -> Self {
        let audio = Arc::new(AudioRoutingController::new(
            audio_platform,
            config.audio.clone(),
        ));
        Self {
            factory,
            config,
            audio,
            tracker: Arc::new(ConnectionStateTracker::new()),
            delegate: DelegateHandle::default(),
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Registers `delegate` without taking ownership of it.
    pub fn set_delegate<D: SessionDelegate>(&self, delegate: &Arc<D>) {
        let delegate: Weak<dyn SessionDelegate> = Arc::downgrade(delegate) as Weak<dyn SessionDelegate>;
        self.delegate.set(delegate);
    }

    fn active(&self) -> Result<Arc<Active<F::Connection>>, SessionError> {
        match &*self.phase.lock() {
            Phase::Running(active) => Ok(Arc::clone(active)),
            Phase::Idle | Phase::Starting => Err(SessionError::NotStarted),
            Phase::Aborting(_) | Phase::Closed => Err(SessionError::Closed),
        }
    }

    /// Creates the engine connection, attaches local media, opens the data channel and
    /// activates audio routing, in that order.
    ///
    /// Failing to get audio focus is reported to the delegate and does not fail start.
    #[instrument(level = "debug", skip(self, ice_servers), err)]
    pub async fn start(&self, ice_servers: Vec<IceServer>) -> Result<(), SessionError> {
        {
            let mut phase = self.phase.lock();
            match *phase {
                Phase::Idle => *phase = Phase::Starting,
                Phase::Aborting(_) | Phase::Closed => return Err(SessionError::Closed),
                Phase::Starting | Phase::Running(_) => return Err(SessionError::AlreadyStarted),
            }
        }
        let mut guard = StartGuard {
            phase: &self.phase,
            settled: false,
        };

        let active = self.build(ice_servers).await?;

        let aborted = {
            let mut phase = self.phase.lock();
            guard.settled = true;
            match std::mem::replace(&mut *phase, Phase::Closed) {
                Phase::Aborting(report_tx) => Some(report_tx),
                _ => {
                    *phase = Phase::Running(Arc::clone(&active));
                    None
                }
            }
        };
        if let Some(report_tx) = aborted {
            tracing::debug!("Session closed while starting, tearing down");
            let report = self.teardown(&active).await;
            self.report_teardown(&report);
            if report_tx.send(report).is_err() {
                tracing::trace!("Closer stopped waiting for the teardown report");
            }
            return Err(SessionError::Closed);
        }

        let result = self.audio.activate();
        match &result {
            Ok(()) => tracing::debug!("Audio session activated"),
            Err(err) => {
                tracing::warn!(?err, "Continuing without audio focus");
                self.delegate
                    .notify(|d| d.on_error(&SessionError::AudioFocusDenied(err.to_string())));
            }
        }
        self.delegate
            .notify(|d| d.on_audio_session_ready(result.as_ref().map(|_| ())));

        if self.config.silence.enabled {
            *active.silence.lock() = Some(self.spawn_silence_detector(&active));
        }

        Ok(())
    }

    async fn build(
        &self,
        ice_servers: Vec<IceServer>,
    ) -> Result<Arc<Active<F::Connection>>, SessionError> {
        let (connection, events) = self
            .factory
            .create_connection(ConnectionConfig::new(ice_servers))
            .await?;
        let connection = Arc::new(connection);

        let tracks = TrackManager::new(Arc::clone(&connection), self.config.media.clone());
        let channels = Arc::new(DataChannelSupervisor::new());
        let setup = async {
            tracks.attach_local_tracks().await?;
            channels
                .open(connection.as_ref(), &self.config.data_channel)
                .await
        };
        if let Err(err) = setup.await {
            tracing::warn!(?err, "Session setup failed, closing connection");
            if let Err(err) = connection.close().await {
                tracing::warn!(?err, "Failed to close connection after setup failure");
            }
            return Err(err);
        }

        let shutdown_token = CancellationToken::new();
        let event_task = tokio::spawn(
            event_loop(
                events,
                shutdown_token.clone(),
                Arc::clone(&self.tracker),
                Arc::clone(&channels),
                self.delegate.clone(),
            )
            .instrument(tracing::Span::current()),
        );

        Ok(Arc::new(Active {
            signaling: SignalingCoordinator::new(Arc::clone(&connection)),
            connection,
            tracks,
            channels,
            silence: Mutex::new(None),
            shutdown_token,
            event_task,
        }))
    }

    fn spawn_silence_detector(&self, active: &Active<F::Connection>) -> SilenceDetector {
        let connection = Arc::downgrade(&active.connection);
        let delegate = self.delegate.clone();
        SilenceDetector::spawn(
            &self.config.silence,
            move || {
                let connection = connection.clone();
                async move {
                    let connection = connection.upgrade()?;
                    let stats = connection.statistics().await.ok()?;
                    AudioTrackType::Output
                        .level(&stats)
                        .map(normalize_audio_level)
                }
            },
            move || delegate.notify(|d| d.on_audio_completion()),
        )
    }

    pub async fn offer(&self) -> Result<SessionDescription, SessionError> {
        self.active()?.signaling.create_offer().await
    }

    pub async fn answer(&self) -> Result<SessionDescription, SessionError> {
        self.active()?.signaling.create_answer().await
    }

    /// Applies the remote peer's description, then every candidate it sent ahead of it.
    /// Queued candidates the engine refuses are reported to the delegate one by one.
    pub async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError> {
        let flush = self
            .active()?
            .signaling
            .apply_remote_description(description)
            .await?;
        for candidate in flush.rejected {
            self.delegate
                .notify(|d| d.on_error(&SessionError::CandidateRejected(candidate)));
        }
        Ok(())
    }

    pub async fn add_remote_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<CandidateDisposition, SessionError> {
        self.active()?.signaling.add_remote_candidate(candidate).await
    }

    /// Sends on the application data channel. Refused with
    /// [`SessionError::ChannelNotReady`] unless the channel is open.
    pub async fn send_data(&self, message: DataMessage) -> Result<(), SessionError> {
        self.active()?.channels.send(message).await
    }

    pub async fn mute_audio(&self) -> Result<(), SessionError> {
        self.set_local_enabled(TrackKind::Audio, false).await
    }

    pub async fn unmute_audio(&self) -> Result<(), SessionError> {
        self.set_local_enabled(TrackKind::Audio, true).await
    }

    pub async fn hide_video(&self) -> Result<(), SessionError> {
        self.set_local_enabled(TrackKind::Video, false).await
    }

    pub async fn show_video(&self) -> Result<(), SessionError> {
        self.set_local_enabled(TrackKind::Video, true).await
    }

    pub async fn mute_remote_audio(&self) -> Result<(), SessionError> {
        self.active()?
            .tracks
            .set_remote_enabled(TrackKind::Audio, false)
            .await
    }

    pub async fn unmute_remote_audio(&self) -> Result<(), SessionError> {
        self.active()?
            .tracks
            .set_remote_enabled(TrackKind::Audio, true)
            .await
    }

    async fn set_local_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), SessionError> {
        self.active()?.tracks.set_local_enabled(kind, enabled).await
    }

    pub async fn set_track_enabled(&self, track_id: &str, enabled: bool) -> Result<(), SessionError> {
        self.active()?.tracks.set_track_enabled(track_id, enabled).await
    }

    pub async fn is_audio_enabled(&self) -> bool {
        match self.active() {
            Ok(active) => active.tracks.is_audio_enabled().await,
            Err(_) => false,
        }
    }

    pub fn local_tracks(&self) -> Vec<Track> {
        self.active()
            .map(|active| active.tracks.local_tracks())
            .unwrap_or_default()
    }

    pub async fn remote_tracks(&self) -> Result<Vec<Track>, SessionError> {
        Ok(self.active()?.tracks.remote_tracks().await)
    }

    /// Current level of `track_type` normalized to `[0, 1]`, `None` when the engine does
    /// not report one.
    pub async fn audio_level(&self, track_type: AudioTrackType) -> Result<Option<f64>, SessionError> {
        let stats = self.active()?.connection.statistics().await?;
        Ok(track_type.level(&stats).map(normalize_audio_level))
    }

    /// Forces output to the speaker. Without an active audio session this only warns.
    pub fn speaker_on(&self) {
        let result = self.audio.route_to_speaker();
        self.delegate
            .notify(|d| d.on_audio_session_ready(result.as_ref().map(|_| ())));
    }

    /// Hands output routing back to the platform.
    pub fn speaker_off(&self) {
        let result = self.audio.route_to_default();
        self.delegate
            .notify(|d| d.on_audio_session_ready(result.as_ref().map(|_| ())));
    }

    pub fn current_route(&self) -> Result<AudioRoute, AudioError> {
        self.audio.current_route()
    }

    /// The coordinator's negotiation state. See
    /// [`ConnectionStateTracker::current_signaling_state`] for what the engine last reported.
    pub fn signaling_state(&self) -> SignalingState {
        match &*self.phase.lock() {
            Phase::Idle | Phase::Starting => SignalingState::Stable,
            Phase::Running(active) => active.signaling.state(),
            Phase::Aborting(_) | Phase::Closed => SignalingState::Closed,
        }
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.tracker.current_ice_state()
    }

    pub fn ice_gathering_state(&self) -> IceGatheringState {
        self.tracker.current_gathering_state()
    }

    pub fn data_channel_state(&self) -> Option<DataChannelState> {
        self.active().ok().and_then(|active| active.channels.state())
    }

    pub fn tracker(&self) -> &ConnectionStateTracker {
        &self.tracker
    }

    /// Subscribes to a broadcast channel emitting every engine-reported [`StateChange`].
    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<StateChange> {
        self.tracker.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Aborting(_) | Phase::Closed)
    }

    /// Tears the session down. Safe to call any number of times; only the first call on
    /// a started session does any work. Called while [`Session::start`] is in flight, it
    /// waits for start to tear down what it built and returns that report.
    ///
    /// Every step runs even if an earlier one failed. Failures are collected into the
    /// returned report and, if there are any, sent to the delegate once at the end.
    #[instrument(level = "debug", skip(self))]
    pub async fn close(&self) -> TeardownReport {
        let action = {
            let mut phase = self.phase.lock();
            match std::mem::replace(&mut *phase, Phase::Closed) {
                Phase::Running(active) => CloseAction::Teardown(active),
                Phase::Starting => {
                    let (report_tx, report_rx) = oneshot::channel();
                    *phase = Phase::Aborting(report_tx);
                    CloseAction::AwaitStart(report_rx)
                }
                Phase::Aborting(report_tx) => {
                    *phase = Phase::Aborting(report_tx);
                    CloseAction::Nothing
                }
                Phase::Idle | Phase::Closed => CloseAction::Nothing,
            }
        };

        match action {
            CloseAction::Teardown(active) => {
                let report = self.teardown(&active).await;
                self.report_teardown(&report);
                report
            }
            CloseAction::AwaitStart(report_rx) => {
                tracing::debug!("Waiting for in-flight start to tear down");
                report_rx.await.unwrap_or_else(|_| {
                    tracing::trace!("Start gave up before building anything");
                    TeardownReport::default()
                })
            }
            CloseAction::Nothing => {
                tracing::trace!("Session not running, nothing to tear down");
                TeardownReport::default()
            }
        }
    }

    fn report_teardown(&self, report: &TeardownReport) {
        if !report.is_clean() {
            let err = SessionError::TeardownPartialFailure(report.failures.clone());
            self.delegate.notify(|d| d.on_error(&err));
        }
    }

    async fn teardown(&self, active: &Active<F::Connection>) -> TeardownReport {
        tracing::debug!("Tearing down session");
        let mut report = TeardownReport::default();
        active.signaling.close();

        if let Some(silence) = active.silence.lock().take() {
            silence.cancel();
        }

        for kind in [TrackKind::Audio, TrackKind::Video] {
            if let Err(err) = active.tracks.set_local_enabled(kind, false).await {
                report.record(TeardownStep::DisableLocalTracks, err);
            }
        }

        if let Err(err) = active.connection.stop_capture().await {
            report.record(TeardownStep::StopCapture, err);
        }

        for err in active.channels.close_all().await {
            report.record(TeardownStep::CloseDataChannels, err);
        }

        if let Err(err) = self.audio.deactivate() {
            report.record(TeardownStep::DeactivateAudio, err);
        }

        for err in active.tracks.release_transceivers().await {
            report.record(TeardownStep::ReleaseTransceivers, err);
        }

        if let Err(err) = active.connection.close().await {
            report.record(TeardownStep::CloseConnection, err);
        }

        active.shutdown_token.cancel();
        tracing::debug!(failures = report.failures.len(), "Session torn down");
        report
    }
}

impl<F: MediaEngineFactory> Drop for Session<F> {
    fn drop(&mut self) {
        if let Phase::Running(active) = self.phase.get_mut() {
            tracing::debug!("Session dropped without close, stopping background tasks");
            if let Some(silence) = active.silence.lock().take() {
                silence.cancel();
            }
            active.shutdown_token.cancel();
            active.event_task.abort();
        }
    }
}

#[instrument(level = "debug", skip_all)]
async fn event_loop(
    mut events: EngineEvents,
    shutdown_token: CancellationToken,
    tracker: Arc<ConnectionStateTracker>,
    channels: Arc<DataChannelSupervisor>,
    delegate: DelegateHandle,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => {
                tracing::trace!("Shutdown requested, stopping engine event loop");
                break;
            }
            event = events.recv() => match event {
                Some(event) => dispatch(event, &tracker, &channels, &delegate),
                None => {
                    tracing::debug!("Engine event stream ended");
                    break;
                }
            }
        }
    }
}

fn dispatch(
    event: EngineEvent,
    tracker: &ConnectionStateTracker,
    channels: &DataChannelSupervisor,
    delegate: &DelegateHandle,
) {
    tracing::trace!(?event, "Engine event");
    match event {
        EngineEvent::SignalingStateChanged(state) => {
            let change = tracker.record(StateUpdate::Signaling(state));
            delegate.notify(|d| d.on_signaling_state_changed(state, change.at));
        }
        EngineEvent::IceConnectionStateChanged(state) => {
            let change = tracker.record(StateUpdate::IceConnection(state));
            delegate.notify(|d| d.on_ice_connection_state_changed(state, change.at));
        }
        EngineEvent::IceGatheringStateChanged(state) => {
            let change = tracker.record(StateUpdate::IceGathering(state));
            delegate.notify(|d| d.on_ice_gathering_state_changed(state, change.at));
        }
        EngineEvent::IceCandidateGenerated(candidate) => {
            delegate.notify(|d| d.on_local_candidate(&candidate));
        }
        EngineEvent::IceCandidatesRemoved(candidates) => {
            delegate.notify(|d| d.on_local_candidates_removed(&candidates));
        }
        EngineEvent::TrackAdded(track) => {
            delegate.notify(|d| d.on_track_added(&track));
        }
        EngineEvent::DataChannelOpened(channel) => {
            let label = channel.label().to_string();
            let state = channel.ready_state();
            channels.adopt_remote(channel);
            delegate.notify(|d| d.on_remote_data_channel(&label, state));
        }
        EngineEvent::DataChannelStateChanged { origin, state } => {
            delegate.notify(|d| d.on_data_channel_state_changed(origin, state));
        }
        EngineEvent::DataChannelMessage { origin, message } => {
            delegate.notify(|d| d.on_data_received(origin, &message));
        }
        EngineEvent::RenegotiationNeeded => {
            delegate.notify(|d| d.on_renegotiation_needed());
        }
    }
}
