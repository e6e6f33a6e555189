use crate::config::DataChannelSettings;
use crate::error::SessionError;
use parley_engine::error::EngineError;
use parley_engine::{DataChannelState, DataMessage, EngineConnection, EngineDataChannel};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::instrument;

/// Owns the session's single application data channel and any channels the remote
/// peer opened towards us.
#[derive(Default)]
pub struct DataChannelSupervisor {
    local: Mutex<Option<Arc<dyn EngineDataChannel>>>,
    remote: Mutex<Vec<Arc<dyn EngineDataChannel>>>,
}

impl DataChannelSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(level = "debug", skip(self, connection), fields(label = %settings.label), err)]
    pub async fn open<C: EngineConnection>(
        &self,
        connection: &C,
        settings: &DataChannelSettings,
    ) -> Result<(), SessionError> {
        let channel = connection
            .create_data_channel(&settings.label, &settings.channel_config())
            .await?;
        tracing::trace!(state = ?channel.ready_state(), "Created data channel");
        *self.local.lock() = Some(channel);
        Ok(())
    }

    pub fn adopt_remote(&self, channel: Arc<dyn EngineDataChannel>) {
        tracing::trace!(label = ?channel.label(), "Adopting remote data channel");
        self.remote.lock().push(channel);
    }

    /// Live state of the local channel, `None` before it was created or after close.
    pub fn state(&self) -> Option<DataChannelState> {
        self.local
            .lock()
            .as_ref()
            .map(|channel| channel.ready_state())
    }

    /// Sends on the local channel if, and only if, it is open right now.
    #[instrument(level = "debug", skip(self, message), fields(len = message.data.len()), err)]
    pub async fn send(&self, message: DataMessage) -> Result<(), SessionError> {
        let Some(channel) = self.local.lock().clone() else {
            tracing::warn!("Tried to send data before the data channel was created");
            return Err(SessionError::NotStarted);
        };

        let state = channel.ready_state();
        if state != DataChannelState::Open {
            tracing::warn!(?state, "Data channel not open, dropping message");
            return Err(SessionError::ChannelNotReady { state });
        }

        Ok(channel.send(message).await?)
    }

    /// Closes the local and every remote channel. Closed channels are forgotten, so a
    /// second call has nothing left to do.
    #[instrument(level = "debug", skip(self))]
    pub async fn close_all(&self) -> Vec<EngineError> {
        let local = self.local.lock().take();
        let remote = std::mem::take(&mut *self.remote.lock());

        let mut errors = Vec::new();
        for channel in local.into_iter().chain(remote) {
            if let Err(err) = channel.close().await {
                tracing::warn!(?err, label = ?channel.label(), "Failed to close data channel");
                errors.push(err);
            }
        }
        errors
    }
}
