use anyhow::Context;
use parley_audio::device::CpalAudioSession;
use parley_engine::rtc::RtcEngineFactory;
use parley_engine::{ChannelOrigin, DataChannelState, DataMessage, IceCandidate, MediaEngineFactory};
use parley_session::config::SessionConfig;
use parley_session::error::SessionError;
use parley_session::{Session, SessionDelegate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "parley.toml";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
enum PeerEvent {
    Candidate(IceCandidate),
    ChannelOpen,
    Received(DataMessage),
}

/// Forwards what a session reports into the loopback's main loop.
struct Peer {
    name: &'static str,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl Peer {
    fn forward(&self, event: PeerEvent) {
        if let Err(err) = self.events_tx.send(event) {
            tracing::trace!(peer = self.name, event = ?err.0, "Main loop gone, dropping event");
        }
    }
}

impl SessionDelegate for Peer {
    fn on_local_candidate(&self, candidate: &IceCandidate) {
        self.forward(PeerEvent::Candidate(candidate.clone()));
    }

    fn on_data_channel_state_changed(&self, origin: ChannelOrigin, state: DataChannelState) {
        tracing::debug!(peer = self.name, ?origin, ?state, "Data channel state changed");
        if origin == ChannelOrigin::Local && state == DataChannelState::Open {
            self.forward(PeerEvent::ChannelOpen);
        }
    }

    fn on_data_received(&self, origin: ChannelOrigin, message: &DataMessage) {
        tracing::debug!(peer = self.name, ?origin, len = message.data.len(), "Data received");
        self.forward(PeerEvent::Received(message.clone()));
    }

    fn on_error(&self, error: &SessionError) {
        tracing::warn!(peer = self.name, ?error, "Session reported an error");
    }
}

/// Sends a value through its JSON wire shape, the way a signaling server would.
fn relay<T: Serialize + DeserializeOwned>(value: &T) -> anyhow::Result<T> {
    let json = serde_json::to_string(value).context("Failed to serialize signaling message")?;
    serde_json::from_str(&json).context("Failed to deserialize signaling message")
}

/// Hands a relayed candidate to `session`. A candidate the engine refuses is logged and
/// skipped; the remaining candidates may still connect the peers.
async fn apply_candidate<F: MediaEngineFactory>(
    session: &Session<F>,
    name: &'static str,
    candidate: IceCandidate,
) -> Result<(), SessionError> {
    match session.add_remote_candidate(candidate).await {
        Ok(disposition) => {
            tracing::trace!(peer = name, ?disposition, "Applied remote candidate");
            Ok(())
        }
        Err(SessionError::CandidateRejected(candidate)) => {
            tracing::warn!(peer = name, ?candidate, "Remote candidate rejected, skipping");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,parley_session=debug,parley_engine=debug,parley_audio=debug",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::parse(Some(Path::new(CONFIG_FILE)))?;
    tracing::debug!(?config, "Loaded config");

    let factory = Arc::new(RtcEngineFactory::new().context("Failed to create media engine")?);
    let audio_platform = || {
        Arc::new(CpalAudioSession::new(
            config.audio.host.clone(),
            config.audio.output_device.clone(),
        ))
    };

    let caller = Session::new(Arc::clone(&factory), config.clone(), audio_platform());
    let callee = Session::new(Arc::clone(&factory), config.clone(), audio_platform());

    let (caller_tx, mut caller_rx) = mpsc::unbounded_channel();
    let (callee_tx, mut callee_rx) = mpsc::unbounded_channel();
    let caller_peer = Arc::new(Peer {
        name: "caller",
        events_tx: caller_tx,
    });
    let callee_peer = Arc::new(Peer {
        name: "callee",
        events_tx: callee_tx,
    });
    caller.set_delegate(&caller_peer);
    callee.set_delegate(&callee_peer);

    caller.start(config.ice.servers.clone()).await?;
    callee.start(config.ice.servers.clone()).await?;

    let offer = caller.offer().await?;
    callee.set_remote_description(relay(&offer)?).await?;
    let answer = callee.answer().await?;
    caller.set_remote_description(relay(&answer)?).await?;
    tracing::info!("Negotiation complete, waiting for the data channel");

    let exchange = async {
        loop {
            tokio::select! {
                Some(event) = caller_rx.recv() => match event {
                    PeerEvent::Candidate(candidate) => {
                        apply_candidate(&callee, "callee", relay(&candidate)?).await?;
                    }
                    PeerEvent::ChannelOpen => {
                        caller.send_data(DataMessage::text("hello from the caller")).await?;
                    }
                    PeerEvent::Received(_) => {}
                },
                Some(event) = callee_rx.recv() => match event {
                    PeerEvent::Candidate(candidate) => {
                        apply_candidate(&caller, "caller", relay(&candidate)?).await?;
                    }
                    PeerEvent::Received(message) => {
                        tracing::info!(
                            message = %String::from_utf8_lossy(&message.data),
                            "Callee received message"
                        );
                        return anyhow::Ok(());
                    }
                    PeerEvent::ChannelOpen => {}
                },
                else => anyhow::bail!("Both sessions stopped reporting events"),
            }
        }
    };

    let outcome = tokio::select! {
        result = tokio::time::timeout(CONNECT_TIMEOUT, exchange) => {
            result.context("Timed out waiting for the loopback exchange").and_then(|r| r)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    for (name, session) in [("caller", &caller), ("callee", &callee)] {
        let report = session.close().await;
        if !report.is_clean() {
            tracing::warn!(peer = name, failures = ?report.failures, "Teardown incomplete");
        }
    }

    outcome
}
