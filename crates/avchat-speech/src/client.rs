//! Speech client implementing the core speech/avatar port.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use avchat_core::{AvatarError, SessionState, SpeechAvatarPort, SpeechQueueItem, SpeechSettings};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{AvatarBackend, AvatarConnection, RelayToken};
use crate::queue::{SpeechQueue, run_worker};

struct Worker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

struct ClientState {
    state: SessionState,
    connection: Option<AvatarConnection>,
    worker: Option<Worker>,
}

/// Talking-avatar client with a FIFO speech queue.
///
/// `speak` enqueues and returns; a worker task spawned on open speaks one
/// item at a time. `stop` clears the queue and interrupts the current item.
pub struct AvatarSpeechClient {
    backend: Arc<dyn AvatarBackend>,
    queue: Arc<SpeechQueue>,
    inner: Mutex<ClientState>,
}

impl AvatarSpeechClient {
    pub fn new(backend: Arc<dyn AvatarBackend>) -> Self {
        Self {
            backend,
            queue: Arc::new(SpeechQueue::new()),
            inner: Mutex::new(ClientState {
                state: SessionState::Closed,
                connection: None,
                worker: None,
            }),
        }
    }

    /// Relay credentials of the open session, if the backend issued any.
    pub fn relay_token(&self) -> Option<RelayToken> {
        self.lock()
            .connection
            .as_ref()
            .and_then(|c| c.relay.clone())
    }

    /// Number of items waiting behind the current one.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SpeechAvatarPort for AvatarSpeechClient {
    async fn open_session(&self, settings: &SpeechSettings) -> Result<(), AvatarError> {
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Closed {
                return Err(AvatarError::invalid_state(format!(
                    "speech session is {}",
                    inner.state
                )));
            }
            inner.state = SessionState::Opening;
        }

        let connection = match self.backend.connect(settings).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open speech session");
                self.lock().state = SessionState::Closed;
                return Err(e.into());
            }
        };

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.queue),
            Arc::clone(&self.backend),
            settings.voice.clone(),
            shutdown.clone(),
        ));

        let mut inner = self.lock();
        inner.state = SessionState::Open;
        inner.connection = Some(connection);
        inner.worker = Some(Worker { shutdown, handle });
        tracing::info!(voice = %settings.voice, "Speech session open");
        Ok(())
    }

    fn speak(&self, item: SpeechQueueItem) -> Result<(), AvatarError> {
        let state = self.lock().state;
        if state != SessionState::Open {
            return Err(AvatarError::invalid_state(format!(
                "cannot speak while speech session is {state}"
            )));
        }
        if item.text.trim().is_empty() {
            tracing::debug!("Ignoring blank speech item");
            return Ok(());
        }
        self.queue.push(item);
        Ok(())
    }

    async fn stop(&self) {
        let dropped = self.queue.clear();
        tracing::debug!(dropped, "Speech queue cleared");

        if self.lock().state == SessionState::Open {
            if let Err(e) = self.backend.stop_speaking().await {
                tracing::warn!(error = %e, "Failed to interrupt avatar speech");
            }
        }
    }

    async fn close_session(&self) -> Result<(), AvatarError> {
        let worker = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Closed => return Ok(()),
                SessionState::Opening | SessionState::Closing => {
                    return Err(AvatarError::invalid_state(format!(
                        "cannot close while speech session is {}",
                        inner.state
                    )));
                }
                SessionState::Open => {}
            }
            inner.state = SessionState::Closing;
            inner.worker.take()
        };

        self.queue.clear();
        if let Some(worker) = worker {
            worker.shutdown.cancel();
            if let Err(e) = worker.handle.await {
                tracing::warn!(error = %e, "Speech worker ended abnormally");
            }
        }
        self.backend.disconnect().await;

        let mut inner = self.lock();
        inner.state = SessionState::Closed;
        inner.connection = None;
        tracing::info!("Speech session closed");
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.lock().state
    }
}

impl Drop for AvatarSpeechClient {
    fn drop(&mut self) {
        if let Some(worker) = self.lock().worker.take() {
            worker.shutdown.cancel();
        }
    }
}
