//! FIFO speech queue and the worker that drains it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use avchat_core::SpeechQueueItem;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::backend::AvatarBackend;
use crate::ssml::build_ssml;

struct QueueState {
    items: VecDeque<SpeechQueueItem>,
    /// Cancelled on `clear` to interrupt the utterance in flight.
    playback: CancellationToken,
}

/// Items waiting to be spoken, in enqueue order.
pub(crate) struct SpeechQueue {
    state: Mutex<QueueState>,
    wake: Notify,
}

impl SpeechQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                playback: CancellationToken::new(),
            }),
            wake: Notify::new(),
        }
    }

    pub(crate) fn push(&self, item: SpeechQueueItem) {
        self.lock().items.push_back(item);
        self.wake.notify_one();
    }

    /// Drop every pending item and interrupt the current one.
    ///
    /// Returns the number of pending items dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.items.len();
        state.items.clear();
        state.playback.cancel();
        state.playback = CancellationToken::new();
        dropped
    }

    /// Pop the next item with the token that interrupts it.
    fn next(&self) -> Option<(SpeechQueueItem, CancellationToken)> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        Some((item, state.playback.clone()))
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Speak queued items one at a time until `shutdown` fires.
///
/// A failed item is logged and skipped; the worker keeps going.
pub(crate) async fn run_worker(
    queue: Arc<SpeechQueue>,
    backend: Arc<dyn AvatarBackend>,
    default_voice: String,
    shutdown: CancellationToken,
) {
    tracing::debug!("Speech worker started");

    loop {
        let Some((item, playback)) = queue.next() else {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = queue.wake.notified() => {}
            }
            continue;
        };

        let voice = item.options.voice.as_deref().unwrap_or(&default_voice);
        let ssml = build_ssml(&item.text, voice, item.options.ending_silence_ms);
        tracing::debug!(chars = item.text.chars().count(), voice, "Speaking queued item");

        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            () = playback.cancelled() => {
                tracing::debug!("Utterance interrupted");
            }
            result = backend.speak(&ssml) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to speak queued item, skipping");
                }
            }
        }
    }

    tracing::debug!("Speech worker stopped");
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[test]
    fn test_push_wakes_idle_worker() {
        let queue = SpeechQueue::new();
        let mut idle = task::spawn(queue.wake.notified());
        assert_pending!(idle.poll());

        queue.push(SpeechQueueItem::new("hello"));

        assert!(idle.is_woken());
        assert_ready!(idle.poll());
    }

    #[test]
    fn test_next_is_fifo() {
        let queue = SpeechQueue::new();
        queue.push(SpeechQueueItem::new("one"));
        queue.push(SpeechQueueItem::new("two"));

        assert_eq!(queue.next().unwrap().0.text, "one");
        assert_eq!(queue.next().unwrap().0.text, "two");
        assert!(queue.next().is_none());
    }

    #[test]
    fn test_clear_cancels_in_flight_token_only() {
        let queue = SpeechQueue::new();
        queue.push(SpeechQueueItem::new("one"));
        queue.push(SpeechQueueItem::new("two"));
        let (_, in_flight) = queue.next().unwrap();

        assert_eq!(queue.clear(), 1);
        assert!(in_flight.is_cancelled());
        assert_eq!(queue.len(), 0);

        queue.push(SpeechQueueItem::new("three"));
        let (_, fresh) = queue.next().unwrap();
        assert!(!fresh.is_cancelled());
    }
}
