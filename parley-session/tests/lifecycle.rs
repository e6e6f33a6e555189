mod common;

use common::{Fixture, Recorded, STUN_SERVER};
use parley_audio::mock::AudioCall;
use parley_audio::{AudioRoute, PortOverride};
use parley_engine::mock::{EngineCall, Operation};
use parley_engine::{
    ChannelOrigin, ConnectionConfig, DataChannelState, DataMessage, Direction, IceServer,
    SignalingState, StatsReport, TrackKind, TransceiverId,
};
use parley_session::AudioTrackType;
use parley_session::config::SessionConfig;
use parley_session::error::{SessionError, TeardownStep};
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;

#[test(tokio::test)]
async fn start_builds_connection_media_and_channel_in_order() {
    let fixture = Fixture::started().await;

    assert_eq!(
        fixture.engine.operations(),
        vec![
            Operation::CreateConnection,
            Operation::CreateAudioTrack,
            Operation::CreateVideoTrack,
            Operation::AddTrack,
            Operation::AddTrack,
            Operation::CreateDataChannel,
        ]
    );
    assert_eq!(
        fixture.engine.calls()[0],
        EngineCall::CreateConnection(ConnectionConfig::new(vec![IceServer::from(STUN_SERVER)]))
    );
    assert_eq!(
        fixture.session.data_channel_state(),
        Some(DataChannelState::Connecting)
    );
    assert_eq!(fixture.session.local_tracks().len(), 2);
    assert!(fixture.session.is_audio_enabled().await);
}

#[test(tokio::test)]
async fn start_activates_audio_and_routes_to_speaker() {
    let fixture = Fixture::started().await;

    let calls = fixture.audio.calls();
    assert!(matches!(calls[0], AudioCall::Configure(_)));
    assert_eq!(
        &calls[1..],
        &[
            AudioCall::SetActive(true),
            AudioCall::OverrideOutputPort(PortOverride::Speaker)
        ]
    );
    assert_eq!(fixture.session.current_route().unwrap(), AudioRoute::Speaker);
    assert_eq!(fixture.delegate.recorded(), vec![Recorded::AudioReady(Ok(()))]);
}

#[test(tokio::test)]
async fn denied_audio_focus_does_not_fail_start() {
    let fixture = Fixture::new(SessionConfig::default());
    fixture.audio.deny_focus(true);

    fixture
        .session
        .start(vec![IceServer::from(STUN_SERVER)])
        .await
        .unwrap();

    let errors = fixture.delegate.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("AudioFocusDenied"));
    assert!(matches!(
        fixture.delegate.recorded().last(),
        Some(Recorded::AudioReady(Err(_)))
    ));
    assert!(!fixture.audio.is_active());

    fixture.session.offer().await.unwrap();
}

#[test(tokio::test)]
async fn failed_setup_closes_connection_and_allows_retry() {
    let fixture = Fixture::new(SessionConfig::default());
    fixture.engine.fail(Operation::CreateDataChannel, "sctp unavailable");

    let result = fixture.session.start(vec![]).await;
    assert!(matches!(result, Err(SessionError::Engine(_))));
    assert_eq!(fixture.engine.count(Operation::Close), 1);
    assert!(fixture.audio.calls().is_empty());
    assert!(!fixture.session.is_closed());
}

#[test(tokio::test)]
async fn operations_outside_a_running_session_are_refused() {
    let fixture = Fixture::new(SessionConfig::default());

    assert!(matches!(
        fixture.session.offer().await,
        Err(SessionError::NotStarted)
    ));
    assert!(matches!(
        fixture.session.send_data(DataMessage::text("hi")).await,
        Err(SessionError::NotStarted)
    ));
    assert!(matches!(
        fixture.session.mute_audio().await,
        Err(SessionError::NotStarted)
    ));
    assert_eq!(fixture.session.signaling_state(), SignalingState::Stable);

    fixture.session.start(vec![]).await.unwrap();
    assert!(matches!(
        fixture.session.start(vec![]).await,
        Err(SessionError::AlreadyStarted)
    ));

    fixture.session.close().await;
    assert!(matches!(
        fixture.session.offer().await,
        Err(SessionError::Closed)
    ));
    assert!(matches!(
        fixture.session.start(vec![]).await,
        Err(SessionError::Closed)
    ));
    assert_eq!(fixture.session.signaling_state(), SignalingState::Closed);
    assert!(!fixture.session.is_audio_enabled().await);
}

#[test(tokio::test)]
async fn close_runs_every_step_in_order() {
    let fixture = Fixture::started().await;
    fixture.engine.clear_calls();

    let report = fixture.session.close().await;
    assert!(report.is_clean());

    let disabled = |track_id: &str| EngineCall::SetTrackEnabled {
        track_id: track_id.to_string(),
        enabled: false,
    };
    assert_eq!(
        fixture.engine.calls(),
        vec![
            disabled("audio0"),
            disabled("video0"),
            EngineCall::StopCapture,
            EngineCall::DataChannelClose(ChannelOrigin::Local),
            EngineCall::ClearSenderTrack(TransceiverId(0)),
            EngineCall::RemoveTrack(TransceiverId(0)),
            EngineCall::StopTransceiver(TransceiverId(0)),
            EngineCall::ClearSenderTrack(TransceiverId(1)),
            EngineCall::RemoveTrack(TransceiverId(1)),
            EngineCall::StopTransceiver(TransceiverId(1)),
            EngineCall::Close,
        ]
    );
    assert_eq!(
        fixture.audio.calls().last(),
        Some(&AudioCall::SetActive(false))
    );
    assert!(!fixture.audio.is_active());
    assert!(!fixture.engine.is_capturing());
    assert!(fixture.session.is_closed());
}

#[test(tokio::test)]
async fn close_releases_every_transceiver() {
    let fixture = Fixture::started().await;
    fixture.engine.add_remote_track(TrackKind::Audio, "remote-audio");

    fixture.session.close().await;

    let transceivers = fixture.engine.transceivers();
    assert_eq!(transceivers.len(), 3);
    for transceiver in transceivers {
        assert_eq!(transceiver.sender_track, None);
        assert_eq!(transceiver.direction, Direction::Stopped);
    }
    assert_eq!(fixture.engine.count(Operation::Close), 1);
}

#[test(tokio::test)]
async fn close_is_idempotent() {
    let fixture = Fixture::started().await;

    let first = fixture.session.close().await;
    let calls = fixture.engine.calls();
    let audio_calls = fixture.audio.calls();
    let second = fixture.session.close().await;

    assert!(first.is_clean());
    assert!(second.is_clean());
    assert_eq!(fixture.engine.calls(), calls);
    assert_eq!(fixture.audio.calls(), audio_calls);
    assert_eq!(fixture.engine.count(Operation::Close), 1);
}

#[test(tokio::test)]
async fn close_before_start_does_nothing() {
    let fixture = Fixture::new(SessionConfig::default());

    assert!(fixture.session.close().await.is_clean());
    assert!(fixture.engine.calls().is_empty());
    assert!(fixture.audio.calls().is_empty());
    assert!(fixture.session.is_closed());
}

#[test(tokio::test)]
async fn teardown_continues_past_failures_and_reports_once() {
    let fixture = Fixture::started().await;
    fixture.engine.fail(Operation::StopCapture, "camera busy");
    fixture.engine.fail(Operation::StopTransceiver, "gone");

    let report = fixture.session.close().await;

    let steps: Vec<TeardownStep> = report.failures.iter().map(|f| f.step).collect();
    assert_eq!(
        steps,
        vec![
            TeardownStep::StopCapture,
            TeardownStep::ReleaseTransceivers,
            TeardownStep::ReleaseTransceivers,
        ]
    );
    assert_eq!(fixture.engine.count(Operation::DataChannelClose), 1);
    assert_eq!(fixture.engine.count(Operation::Close), 1);
    assert!(!fixture.audio.is_active());

    let errors = fixture.delegate.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("TeardownPartialFailure"));
    assert!(matches!(
        report.into_result(),
        Err(SessionError::TeardownPartialFailure(failures)) if failures.len() == 3
    ));
}

#[test(tokio::test)]
async fn close_during_start_waits_for_teardown() {
    let fixture = Fixture::new(SessionConfig::default());
    fixture
        .engine
        .set_connect_delay(Some(Duration::from_millis(50)));
    fixture.engine.fail(Operation::StopCapture, "camera busy");

    let (started, (report, closed_at_return)) = tokio::join!(
        fixture.session.start(vec![IceServer::from(STUN_SERVER)]),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let report = fixture.session.close().await;
            (report, fixture.engine.count(Operation::Close))
        }
    );

    assert!(matches!(started, Err(SessionError::Closed)));
    assert_eq!(closed_at_return, 1);
    let steps: Vec<TeardownStep> = report.failures.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec![TeardownStep::StopCapture]);

    let errors = fixture.delegate.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("TeardownPartialFailure"));
    assert!(fixture.audio.calls().is_empty());
    assert!(fixture.session.is_closed());

    assert!(fixture.session.close().await.is_clean());
    assert_eq!(fixture.engine.count(Operation::Close), 1);
}

#[test(tokio::test)]
async fn mute_round_trip_only_touches_audio() {
    let fixture = Fixture::started().await;

    fixture.session.mute_audio().await.unwrap();
    fixture.session.mute_audio().await.unwrap();
    assert!(!fixture.session.is_audio_enabled().await);
    assert_eq!(fixture.engine.track_enabled("video0"), Some(true));

    fixture.session.unmute_audio().await.unwrap();
    assert!(fixture.session.is_audio_enabled().await);

    fixture.session.hide_video().await.unwrap();
    assert_eq!(fixture.engine.track_enabled("video0"), Some(false));
    fixture.session.show_video().await.unwrap();
    assert_eq!(fixture.engine.track_enabled("video0"), Some(true));
}

#[test(tokio::test)]
async fn remote_audio_can_be_muted() {
    let fixture = Fixture::started().await;
    let remote = fixture
        .engine
        .add_remote_track(TrackKind::Audio, "remote-audio");

    assert_eq!(fixture.session.remote_tracks().await.unwrap(), vec![remote]);

    fixture.session.mute_remote_audio().await.unwrap();
    assert_eq!(fixture.engine.track_enabled("remote-audio"), Some(false));
    assert!(fixture.session.is_audio_enabled().await);

    fixture.session.unmute_remote_audio().await.unwrap();
    assert_eq!(fixture.engine.track_enabled("remote-audio"), Some(true));
}

#[test(tokio::test)]
async fn audio_levels_are_normalized() {
    let fixture = Fixture::started().await;

    assert_eq!(
        fixture.session.audio_level(AudioTrackType::Output).await.unwrap(),
        None
    );

    fixture.engine.set_stats(StatsReport {
        inbound_audio_level: Some(1.0),
        outbound_audio_level: Some(0.0),
        ..Default::default()
    });
    assert_eq!(
        fixture.session.audio_level(AudioTrackType::Output).await.unwrap(),
        Some(1.0)
    );
    assert_eq!(
        fixture.session.audio_level(AudioTrackType::Input).await.unwrap(),
        Some(0.0)
    );
}

#[test(tokio::test)]
async fn speaker_toggles_need_an_active_audio_session() {
    let fixture = Fixture::new(SessionConfig::default());

    fixture.session.speaker_on();
    assert!(fixture.audio.calls().is_empty());
    assert!(matches!(
        fixture.delegate.recorded().as_slice(),
        [Recorded::AudioReady(Err(_))]
    ));

    fixture.session.start(vec![]).await.unwrap();
    fixture.session.speaker_off();
    assert_eq!(fixture.audio.port_override(), PortOverride::None);
    assert_eq!(fixture.session.current_route().unwrap(), AudioRoute::Earpiece);

    fixture.session.speaker_on();
    assert_eq!(fixture.session.current_route().unwrap(), AudioRoute::Speaker);
}

#[test(tokio::test(start_paused = true))]
async fn silent_remote_audio_reports_completion() {
    let mut config = SessionConfig::default();
    config.silence.enabled = true;
    let fixture = Fixture::new(config);
    fixture.engine.set_stats(StatsReport {
        inbound_audio_level: Some(0.0),
        ..Default::default()
    });
    fixture.session.start(vec![]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(
        !fixture
            .delegate
            .recorded()
            .contains(&Recorded::AudioCompletion)
    );

    tokio::time::sleep(Duration::from_millis(700)).await;
    let completions = || {
        fixture
            .delegate
            .recorded()
            .into_iter()
            .filter(|recorded| *recorded == Recorded::AudioCompletion)
            .count()
    };
    assert_eq!(completions(), 1);

    assert!(fixture.session.close().await.is_clean());
    fixture.engine.clear_calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(completions(), 1);
    assert_eq!(fixture.engine.count(Operation::Statistics), 0);
}

#[test(tokio::test)]
async fn dropped_delegate_is_tolerated() {
    let fixture = Fixture::started().await;
    let Fixture {
        session,
        engine,
        delegate,
        ..
    } = fixture;
    drop(delegate);

    engine.open_local_channel();
    engine.receive_message(ChannelOrigin::Local, DataMessage::text("late"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(session.close().await.is_clean());
}
