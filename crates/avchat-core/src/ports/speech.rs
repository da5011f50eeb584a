//! Speech/avatar port definition.

use async_trait::async_trait;

use crate::domain::{SessionState, SpeechQueueItem};
use crate::error::AvatarError;
use crate::settings::SpeechSettings;

/// Port for the talking-avatar backend.
///
/// Implementations own a FIFO speech queue drained by a background worker:
/// `speak` only enqueues, and items play strictly in enqueue order.
#[async_trait]
pub trait SpeechAvatarPort: Send + Sync {
    /// Connect to the backend. Only valid while closed.
    async fn open_session(&self, settings: &SpeechSettings) -> Result<(), AvatarError>;

    /// Enqueue an utterance and return immediately.
    ///
    /// Fails with `InvalidState` when no session is open.
    fn speak(&self, item: SpeechQueueItem) -> Result<(), AvatarError>;

    /// Clear the queue and halt the current utterance. Always succeeds.
    async fn stop(&self);

    /// Tear the session down. A no-op when already closed.
    async fn close_session(&self) -> Result<(), AvatarError>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;
}
