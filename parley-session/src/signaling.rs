use crate::config::MEDIA_CONSTRAINTS;
use crate::error::{NegotiationStep, SessionError};
use parley_engine::{EngineConnection, IceCandidate, SdpType, SessionDescription, SignalingState};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    /// Held until a remote description has been applied.
    Queued,
    Applied,
}

/// Outcome of draining the candidates that arrived before the remote description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFlush {
    pub applied: usize,
    pub rejected: Vec<IceCandidate>,
}

#[derive(Debug, Default)]
struct CandidateQueue {
    remote_applied: bool,
    pending: VecDeque<IceCandidate>,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Local,
    Remote,
}

fn next_state(current: SignalingState, side: Side, kind: SdpType) -> SignalingState {
    match (side, kind) {
        (_, _) if current == SignalingState::Closed => SignalingState::Closed,
        (Side::Local, SdpType::Offer) => SignalingState::HaveLocalOffer,
        (Side::Local, SdpType::ProvisionalAnswer) => SignalingState::HaveLocalProvisionalAnswer,
        (Side::Remote, SdpType::Offer) => SignalingState::HaveRemoteOffer,
        (Side::Remote, SdpType::ProvisionalAnswer) => SignalingState::HaveRemoteProvisionalAnswer,
        (_, SdpType::Answer) => SignalingState::Stable,
    }
}

/// Drives offer/answer negotiation on one engine connection.
///
/// Negotiation steps are serialized: a second caller waits until the running step has
/// completed. Remote candidates arriving before any remote description are queued and
/// flushed in arrival order once one has been applied; the queue lock is held for the
/// whole apply-and-drain so no candidate can overtake the flush.
pub struct SignalingCoordinator<C: EngineConnection> {
    connection: Arc<C>,
    negotiation: Mutex<()>,
    candidates: Mutex<CandidateQueue>,
    state_tx: watch::Sender<SignalingState>,
    closed: CancellationToken,
}

impl<C: EngineConnection> SignalingCoordinator<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            negotiation: Mutex::new(()),
            candidates: Mutex::new(CandidateQueue::default()),
            state_tx: watch::channel(SignalingState::Stable).0,
            closed: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SignalingState {
        *self.state_tx.borrow()
    }

    /// Subscribes to a watch containing the coordinator's [`SignalingState`].
    pub fn subscribe_state(&self) -> watch::Receiver<SignalingState> {
        self.state_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            tracing::debug!("Coordinator closed, discarding negotiation result");
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn advance(&self, side: Side, kind: SdpType) {
        let next = next_state(self.state(), side, kind);
        let previous = self.state_tx.send_replace(next);
        tracing::trace!(?previous, ?next, "Signaling state advanced");
    }

    /// Creates an offer, applies it as the local description and returns it.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        let _negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        let offer = self
            .connection
            .create_offer(&MEDIA_CONSTRAINTS)
            .await
            .map_err(|err| SessionError::negotiation(NegotiationStep::CreateOffer, err))?;
        self.apply_local(offer).await
    }

    /// Creates an answer to the applied remote offer and applies it as the local
    /// description. Sequencing this after a remote offer is up to the caller; the
    /// engine refuses it otherwise.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn create_answer(&self) -> Result<SessionDescription, SessionError> {
        let _negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        let answer = self
            .connection
            .create_answer(&MEDIA_CONSTRAINTS)
            .await
            .map_err(|err| SessionError::negotiation(NegotiationStep::CreateAnswer, err))?;
        self.apply_local(answer).await
    }

    async fn apply_local(
        &self,
        description: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        self.ensure_open()?;
        self.connection
            .set_local_description(description.clone())
            .await
            .map_err(|err| SessionError::negotiation(NegotiationStep::SetLocalDescription, err))?;
        self.ensure_open()?;

        self.advance(Side::Local, description.kind());
        Ok(description)
    }

    #[instrument(level = "debug", skip(self, description), fields(kind = %description.kind()), err)]
    pub async fn apply_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<CandidateFlush, SessionError> {
        let _negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        let mut candidates = self.candidates.lock().await;
        let kind = description.kind();
        self.connection
            .set_remote_description(description)
            .await
            .map_err(|err| {
                SessionError::negotiation(NegotiationStep::SetRemoteDescription, err)
            })?;
        self.ensure_open()?;
        self.advance(Side::Remote, kind);
        candidates.remote_applied = true;

        let mut flush = CandidateFlush::default();
        while let Some(candidate) = candidates.pending.pop_front() {
            if self.is_closed() {
                break;
            }
            if self.connection.add_ice_candidate(candidate.clone()).await {
                flush.applied += 1;
            } else {
                tracing::warn!(?candidate, "Engine rejected queued remote candidate");
                flush.rejected.push(candidate);
            }
        }

        tracing::trace!(applied = flush.applied, rejected = flush.rejected.len(), "Flushed queued remote candidates");
        Ok(flush)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn add_remote_candidate(
        &self,
        candidate: IceCandidate,
    ) -> Result<CandidateDisposition, SessionError> {
        self.ensure_open()?;

        let mut candidates = self.candidates.lock().await;
        self.ensure_open()?;
        if !candidates.remote_applied {
            tracing::trace!("No remote description yet, queueing candidate");
            candidates.pending.push_back(candidate);
            return Ok(CandidateDisposition::Queued);
        }

        if self.connection.add_ice_candidate(candidate.clone()).await {
            Ok(CandidateDisposition::Applied)
        } else {
            tracing::warn!(?candidate, "Engine rejected remote candidate");
            Err(SessionError::CandidateRejected(candidate))
        }
    }

    pub async fn pending_candidates(&self) -> usize {
        self.candidates.lock().await.pending.len()
    }

    /// Marks the coordinator closed. Results of steps still in flight are discarded.
    pub fn close(&self) {
        self.closed.cancel();
        self.state_tx.send_replace(SignalingState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_engine::mock::{self, EngineCall, MockConnection, MockHandle, Operation};
    use parley_engine::{ConnectionConfig, MediaEngineFactory};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use test_log::test;

    async fn coordinator() -> (Arc<SignalingCoordinator<MockConnection>>, MockHandle) {
        let (engine, handle) = mock::create();
        let (connection, _events) = engine
            .create_connection(ConnectionConfig::new(vec![]))
            .await
            .unwrap();
        (
            Arc::new(SignalingCoordinator::new(Arc::new(connection))),
            handle,
        )
    }

    fn candidate(n: u16) -> IceCandidate {
        IceCandidate::new(format!("candidate:{n} 1 udp 1 10.0.0.{n} 5000 typ host"), Some("0".to_string()), 0)
    }

    #[test(tokio::test)]
    async fn offer_then_answer_is_stable() {
        let (coordinator, handle) = coordinator().await;

        let offer = coordinator.create_offer().await.unwrap();
        assert_eq!(offer.kind(), SdpType::Offer);
        assert!(!offer.sdp().is_empty());
        assert_eq!(coordinator.state(), SignalingState::HaveLocalOffer);
        assert_eq!(handle.local_description(), Some(offer));

        coordinator
            .apply_remote_description(SessionDescription::answer("v=0"))
            .await
            .unwrap();
        assert_eq!(coordinator.state(), SignalingState::Stable);
        assert_eq!(handle.signaling_state(), SignalingState::Stable);
    }

    #[test(tokio::test)]
    async fn remote_offer_then_answer_is_stable() {
        let (coordinator, _handle) = coordinator().await;

        coordinator
            .apply_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        assert_eq!(coordinator.state(), SignalingState::HaveRemoteOffer);

        let answer = coordinator.create_answer().await.unwrap();
        assert_eq!(answer.kind(), SdpType::Answer);
        assert_eq!(coordinator.state(), SignalingState::Stable);
    }

    #[test(tokio::test)]
    async fn provisional_answer_keeps_negotiating() {
        let (coordinator, _handle) = coordinator().await;
        coordinator.create_offer().await.unwrap();

        coordinator
            .apply_remote_description(SessionDescription::provisional_answer("v=0"))
            .await
            .unwrap();
        assert_eq!(
            coordinator.state(),
            SignalingState::HaveRemoteProvisionalAnswer
        );
        coordinator
            .apply_remote_description(SessionDescription::answer("v=0"))
            .await
            .unwrap();
        assert_eq!(coordinator.state(), SignalingState::Stable);
    }

    #[test(tokio::test)]
    async fn answer_without_remote_offer_is_refused_by_engine() {
        let (coordinator, _handle) = coordinator().await;

        let result = coordinator.create_answer().await;
        assert!(matches!(
            result,
            Err(SessionError::NegotiationFailed {
                step: NegotiationStep::CreateAnswer,
                ..
            })
        ));
        assert_eq!(coordinator.state(), SignalingState::Stable);
    }

    #[test(tokio::test)]
    async fn offer_creation_failure_is_not_retried() {
        let (coordinator, handle) = coordinator().await;
        handle.fail(Operation::CreateOffer, "no codecs");

        let result = coordinator.create_offer().await;
        assert!(matches!(
            result,
            Err(SessionError::NegotiationFailed {
                step: NegotiationStep::CreateOffer,
                ..
            })
        ));
        assert_eq!(handle.count(Operation::CreateOffer), 1);
        assert_eq!(handle.count(Operation::SetLocalDescription), 0);
        assert_eq!(coordinator.state(), SignalingState::Stable);
    }

    #[test(tokio::test)]
    async fn early_candidates_are_flushed_in_order() {
        let (coordinator, handle) = coordinator().await;

        for n in 1..=3 {
            let disposition = coordinator.add_remote_candidate(candidate(n)).await.unwrap();
            assert_eq!(disposition, CandidateDisposition::Queued);
        }
        assert_eq!(coordinator.pending_candidates().await, 3);
        assert!(handle.applied_candidates().is_empty());
        assert_eq!(handle.count(Operation::AddIceCandidate), 0);

        let flush = coordinator
            .apply_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        assert_eq!(flush.applied, 3);
        assert_eq!(coordinator.pending_candidates().await, 0);
        assert_eq!(
            handle.applied_candidates(),
            vec![candidate(1), candidate(2), candidate(3)]
        );

        let disposition = coordinator.add_remote_candidate(candidate(4)).await.unwrap();
        assert_eq!(disposition, CandidateDisposition::Applied);
        assert_eq!(handle.applied_candidates().len(), 4);
    }

    #[test(tokio::test)]
    async fn candidate_arriving_during_remote_description_waits_for_flush() {
        let (coordinator, handle) = coordinator().await;
        coordinator.add_remote_candidate(candidate(1)).await.unwrap();
        handle.set_negotiation_delay(Some(Duration::from_millis(50)));

        let (flush, disposition) = tokio::join!(
            coordinator.apply_remote_description(SessionDescription::offer("v=0")),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                coordinator.add_remote_candidate(candidate(2)).await
            }
        );

        assert_eq!(flush.unwrap().applied, 1);
        assert_eq!(disposition.unwrap(), CandidateDisposition::Applied);
        assert_eq!(
            handle.applied_candidates(),
            vec![candidate(1), candidate(2)]
        );
        assert_eq!(coordinator.pending_candidates().await, 0);
    }

    #[test(tokio::test)]
    async fn queue_survives_failed_remote_description() {
        let (coordinator, handle) = coordinator().await;
        coordinator.add_remote_candidate(candidate(1)).await.unwrap();

        handle.fail(Operation::SetRemoteDescription, "malformed");
        assert!(coordinator
            .apply_remote_description(SessionDescription::offer("v=0"))
            .await
            .is_err());
        assert_eq!(coordinator.pending_candidates().await, 1);

        handle.succeed(Operation::SetRemoteDescription);
        let flush = coordinator
            .apply_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        assert_eq!(flush.applied, 1);
    }

    #[test(tokio::test)]
    async fn rejected_candidates_are_reported_individually() {
        let (coordinator, handle) = coordinator().await;
        coordinator.add_remote_candidate(candidate(1)).await.unwrap();
        handle.reject_candidates(true);

        let flush = coordinator
            .apply_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        assert_eq!(flush.rejected, vec![candidate(1)]);

        let result = coordinator.add_remote_candidate(candidate(2)).await;
        assert!(matches!(result, Err(SessionError::CandidateRejected(c)) if c == candidate(2)));
        assert_eq!(coordinator.state(), SignalingState::HaveRemoteOffer);
    }

    #[test(tokio::test)]
    async fn racing_offers_are_serialized() {
        let (coordinator, handle) = coordinator().await;
        handle.set_negotiation_delay(Some(Duration::from_millis(20)));

        let (first, second) = tokio::join!(coordinator.create_offer(), coordinator.create_offer());
        first.unwrap();
        second.unwrap();

        assert_eq!(handle.max_concurrent_negotiation_steps(), 1);
        assert_eq!(
            handle.operations(),
            vec![
                Operation::CreateConnection,
                Operation::CreateOffer,
                Operation::SetLocalDescription,
                Operation::CreateOffer,
                Operation::SetLocalDescription,
            ]
        );
    }

    #[test(tokio::test)]
    async fn completion_after_close_is_discarded() {
        let (coordinator, handle) = coordinator().await;
        handle.set_negotiation_delay(Some(Duration::from_millis(50)));

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.create_offer().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.close();

        assert!(matches!(pending.await.unwrap(), Err(SessionError::Closed)));
        assert_eq!(coordinator.state(), SignalingState::Closed);
        assert!(!handle
            .calls()
            .contains(&EngineCall::SetLocalDescription(SdpType::Offer)));
    }
}
