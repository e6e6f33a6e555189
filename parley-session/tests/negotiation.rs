mod common;

use common::{Fixture, Recorded, candidate};
use parley_engine::mock::Operation;
use parley_engine::{
    ChannelOrigin, DataChannelState, DataMessage, EngineDataChannel, EngineEvent,
    IceConnectionState, IceGatheringState, SdpType, SessionDescription, SignalingState, Track, TrackKind,
};
use parley_session::error::{NegotiationStep, SessionError};
use parley_session::{CandidateDisposition, StateUpdate};
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;

#[test(tokio::test)]
async fn offer_and_answer_reach_stable() {
    let fixture = Fixture::started().await;

    let offer = fixture.session.offer().await.unwrap();
    assert_eq!(offer.kind(), SdpType::Offer);
    assert!(!offer.sdp().is_empty());
    assert_eq!(fixture.session.signaling_state(), SignalingState::HaveLocalOffer);
    assert_eq!(fixture.engine.local_description(), Some(offer));

    fixture
        .session
        .set_remote_description(SessionDescription::answer("v=0 remote"))
        .await
        .unwrap();
    assert_eq!(fixture.session.signaling_state(), SignalingState::Stable);

    fixture
        .wait_for(&Recorded::Signaling(SignalingState::Stable))
        .await;
    let signaling: Vec<Recorded> = fixture
        .delegate
        .recorded()
        .into_iter()
        .filter(|recorded| matches!(recorded, Recorded::Signaling(_)))
        .collect();
    assert_eq!(
        signaling,
        vec![
            Recorded::Signaling(SignalingState::HaveLocalOffer),
            Recorded::Signaling(SignalingState::Stable),
        ]
    );
    assert_eq!(
        fixture.session.tracker().current_signaling_state(),
        SignalingState::Stable
    );
}

#[test(tokio::test)]
async fn answering_a_remote_offer_reaches_stable() {
    let fixture = Fixture::started().await;

    fixture
        .session
        .set_remote_description(SessionDescription::offer("v=0 remote"))
        .await
        .unwrap();
    assert_eq!(
        fixture.session.signaling_state(),
        SignalingState::HaveRemoteOffer
    );

    let answer = fixture.session.answer().await.unwrap();
    assert_eq!(answer.kind(), SdpType::Answer);
    assert_eq!(fixture.session.signaling_state(), SignalingState::Stable);
}

#[test(tokio::test)]
async fn failed_negotiation_names_the_step() {
    let fixture = Fixture::started().await;
    fixture.engine.fail(Operation::CreateOffer, "no codecs");

    let result = fixture.session.offer().await;
    assert!(matches!(
        result,
        Err(SessionError::NegotiationFailed { step, .. })
            if step == NegotiationStep::CreateOffer
    ));
    assert_eq!(fixture.engine.count(Operation::CreateOffer), 1);
    assert_eq!(fixture.session.signaling_state(), SignalingState::Stable);
}

#[test(tokio::test)]
async fn early_candidates_wait_for_remote_description() {
    let fixture = Fixture::started().await;

    let disposition = fixture
        .session
        .add_remote_candidate(candidate(1))
        .await
        .unwrap();
    assert_eq!(disposition, CandidateDisposition::Queued);
    assert_eq!(fixture.engine.count(Operation::AddIceCandidate), 0);

    fixture
        .session
        .set_remote_description(SessionDescription::offer("v=0 remote"))
        .await
        .unwrap();
    assert_eq!(fixture.engine.applied_candidates(), vec![candidate(1)]);

    let disposition = fixture
        .session
        .add_remote_candidate(candidate(2))
        .await
        .unwrap();
    assert_eq!(disposition, CandidateDisposition::Applied);
    assert_eq!(
        fixture.engine.applied_candidates(),
        vec![candidate(1), candidate(2)]
    );
}

#[test(tokio::test)]
async fn candidates_keep_arrival_order_across_remote_description() {
    let fixture = Fixture::started().await;
    fixture
        .session
        .add_remote_candidate(candidate(1))
        .await
        .unwrap();
    fixture
        .engine
        .set_negotiation_delay(Some(Duration::from_millis(50)));

    let (applied, disposition) = tokio::join!(
        fixture
            .session
            .set_remote_description(SessionDescription::offer("v=0 remote")),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fixture.session.add_remote_candidate(candidate(2)).await
        }
    );

    applied.unwrap();
    assert_eq!(disposition.unwrap(), CandidateDisposition::Applied);
    assert_eq!(
        fixture.engine.applied_candidates(),
        vec![candidate(1), candidate(2)]
    );
}

#[test(tokio::test)]
async fn rejected_candidates_are_reported() {
    let fixture = Fixture::started().await;
    fixture.engine.reject_candidates(true);

    fixture
        .session
        .add_remote_candidate(candidate(1))
        .await
        .unwrap();
    fixture
        .session
        .set_remote_description(SessionDescription::offer("v=0 remote"))
        .await
        .unwrap();

    let errors = fixture.delegate.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("CandidateRejected"));

    let result = fixture.session.add_remote_candidate(candidate(2)).await;
    assert!(matches!(
        result,
        Err(SessionError::CandidateRejected(rejected)) if rejected == candidate(2)
    ));
}

#[test(tokio::test)]
async fn data_is_only_sent_on_an_open_channel() {
    let fixture = Fixture::started().await;

    let result = fixture.session.send_data(DataMessage::text("early")).await;
    assert!(matches!(
        result,
        Err(SessionError::ChannelNotReady {
            state: DataChannelState::Connecting
        })
    ));
    assert_eq!(fixture.engine.count(Operation::DataChannelSend), 0);

    fixture.engine.open_local_channel();
    fixture
        .wait_for(&Recorded::ChannelState(
            ChannelOrigin::Local,
            DataChannelState::Open,
        ))
        .await;
    assert_eq!(
        fixture.session.data_channel_state(),
        Some(DataChannelState::Open)
    );

    let event = DataMessage::text(r#"{"type":"response.create"}"#);
    fixture.session.send_data(event.clone()).await.unwrap();
    assert_eq!(
        fixture.engine.sent_messages(),
        vec![(ChannelOrigin::Local, event)]
    );
}

#[test(tokio::test)]
async fn repeated_state_reports_are_not_coalesced() {
    let fixture = Fixture::started().await;
    let mut changes = fixture.session.subscribe_state_changes();

    for state in [
        IceConnectionState::Checking,
        IceConnectionState::Checking,
        IceConnectionState::Connected,
    ] {
        fixture.engine.set_ice_connection_state(state);
    }
    fixture
        .wait_for(&Recorded::IceConnection(IceConnectionState::Connected))
        .await;

    let ice: Vec<Recorded> = fixture
        .delegate
        .recorded()
        .into_iter()
        .filter(|recorded| matches!(recorded, Recorded::IceConnection(_)))
        .collect();
    assert_eq!(
        ice,
        vec![
            Recorded::IceConnection(IceConnectionState::Checking),
            Recorded::IceConnection(IceConnectionState::Checking),
            Recorded::IceConnection(IceConnectionState::Connected),
        ]
    );

    let mut updates = Vec::new();
    for _ in 0..3 {
        updates.push(changes.recv().await.unwrap().update);
    }
    assert_eq!(
        updates,
        vec![
            StateUpdate::IceConnection(IceConnectionState::Checking),
            StateUpdate::IceConnection(IceConnectionState::Checking),
            StateUpdate::IceConnection(IceConnectionState::Connected),
        ]
    );
    assert_eq!(
        fixture.session.ice_connection_state(),
        IceConnectionState::Connected
    );
}

#[test(tokio::test)]
async fn engine_events_reach_the_delegate() {
    let fixture = Fixture::started().await;

    fixture
        .engine
        .emit(EngineEvent::IceGatheringStateChanged(IceGatheringState::Gathering));
    fixture
        .engine
        .emit(EngineEvent::IceCandidateGenerated(candidate(7)));
    fixture
        .engine
        .emit(EngineEvent::IceCandidatesRemoved(vec![candidate(7)]));
    fixture.engine.emit(EngineEvent::RenegotiationNeeded);
    let remote = fixture
        .engine
        .add_remote_track(TrackKind::Video, "remote-video");
    fixture
        .engine
        .receive_message(ChannelOrigin::Local, DataMessage::binary(vec![1u8, 2, 3]));

    let expected = vec![
        Recorded::IceGathering(IceGatheringState::Gathering),
        Recorded::LocalCandidate(candidate(7)),
        Recorded::CandidatesRemoved(vec![candidate(7)]),
        Recorded::RenegotiationNeeded,
        Recorded::TrackAdded(remote),
        Recorded::Data(ChannelOrigin::Local, DataMessage::binary(vec![1u8, 2, 3])),
    ];
    fixture.wait_for(expected.last().unwrap()).await;

    let recorded = fixture.delegate.recorded();
    assert_eq!(&recorded[recorded.len() - expected.len()..], &expected[..]);
    assert_eq!(
        fixture.session.ice_gathering_state(),
        IceGatheringState::Gathering
    );
    assert_eq!(
        fixture.session.remote_tracks().await.unwrap(),
        vec![Track::new("remote-video", TrackKind::Video)]
    );
}

#[test(tokio::test)]
async fn remote_channels_are_adopted_and_closed_with_the_session() {
    let fixture = Fixture::started().await;

    let remote = fixture.engine.open_remote_channel("remote-events");
    fixture
        .wait_for(&Recorded::RemoteChannel(
            "remote-events".to_string(),
            DataChannelState::Open,
        ))
        .await;

    fixture
        .engine
        .receive_message(ChannelOrigin::Remote, DataMessage::text("hi"));
    fixture
        .wait_for(&Recorded::Data(ChannelOrigin::Remote, DataMessage::text("hi")))
        .await;

    assert!(fixture.session.close().await.is_clean());
    assert_eq!(fixture.engine.count(Operation::DataChannelClose), 2);
    assert_eq!(
        remote.ready_state(),
        DataChannelState::Closed
    );
}

#[test(tokio::test)]
async fn close_during_negotiation_discards_the_result() {
    let fixture = Fixture::started().await;
    fixture
        .engine
        .set_negotiation_delay(Some(Duration::from_millis(50)));

    let (offer, report) = tokio::join!(fixture.session.offer(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        fixture.session.close().await
    });

    assert!(matches!(offer, Err(SessionError::Closed)));
    assert!(report.is_clean());
    assert_eq!(fixture.session.signaling_state(), SignalingState::Closed);
    assert_eq!(fixture.engine.count(Operation::SetLocalDescription), 0);
}
