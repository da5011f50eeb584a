//! Session controller.
//!
//! The [`SessionController`] is the only surface the UI talks to. It owns
//! the settings, the avatar session and the chat history, and drives a turn
//! through the chat backend into the speech queue.
//!
//! # Phases
//!
//! ```text
//! Idle ──open──▶ Opening ──▶ SessionOpen ──send──▶ TurnInProgress
//!  ▲                │              ▲                     │
//!  └────failure─────┘              └─────turn ends───────┘
//! SessionOpen ──close──▶ Closing ──▶ Idle
//! ```
//!
//! All operations take `&self`, so the UI can cancel a turn or stop speech
//! while `send_message` is still awaiting. Locks are plain `std::sync`
//! mutexes and are never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ChatHistory, ControllerPhase, HistoryMark, Session, SessionState, SpeechQueueItem,
    SynthesisOptions, Turn,
};
use crate::error::AvatarError;
use crate::events::{SessionEvent, TurnStatus};
use crate::ports::{ChatCompletionPort, ChatResponse, FragmentStream, ResponseMode, SpeechAvatarPort};
use crate::settings::{ChatSettings, Settings, SettingsOverrides};
use crate::text::{SegmenterConfig, SentenceSegmenter, sanitize_input, speakable, split_units};

/// Default delay before the single rate-limit retry.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

// ── Configuration ──────────────────────────────────────────────────

/// Tuning knobs for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fixed delay before retrying a rate-limited chat request.
    pub rate_limit_backoff: Duration,

    /// How responses are cut into speech units.
    pub segmenter: SegmenterConfig,

    /// Options attached to every queued utterance.
    pub synthesis: SynthesisOptions,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            segmenter: SegmenterConfig::default(),
            synthesis: SynthesisOptions::default(),
        }
    }
}

/// Result of a finished or cancelled turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// Assistant text received (possibly partial when cancelled).
    pub text: String,
    pub status: TurnStatus,
    /// Number of speech units handed to the avatar.
    pub spoken_units: usize,
}

// ── Controller ─────────────────────────────────────────────────────

/// Coordinates the speech/avatar backend and the chat backend.
pub struct SessionController {
    settings: RwLock<Settings>,
    speech: Arc<dyn SpeechAvatarPort>,
    chat: Arc<dyn ChatCompletionPort>,
    config: ControllerConfig,

    /// `None` while idle.
    session: Mutex<Option<Session>>,
    history: Mutex<ChatHistory>,
    /// Cancellation handle of the running turn, if any.
    turn: Mutex<Option<CancellationToken>>,

    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Create a controller.
    ///
    /// Returns the controller and a receiver for [`SessionEvent`]s.
    pub fn new(
        settings: Settings,
        speech: Arc<dyn SpeechAvatarPort>,
        chat: Arc<dyn ChatCompletionPort>,
        config: ControllerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = Self {
            settings: RwLock::new(settings),
            speech,
            chat,
            config,
            session: Mutex::new(None),
            history: Mutex::new(ChatHistory::new()),
            turn: Mutex::new(None),
            event_tx,
        };
        (controller, event_rx)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Validate settings and connect to the speech/avatar backend.
    ///
    /// On any failure the controller stays idle and the error is returned.
    pub async fn open_avatar_session(&self) -> Result<(), AvatarError> {
        let settings = {
            let mut slot = lock(&self.session);
            if let Some(session) = slot.as_ref() {
                return Err(AvatarError::invalid_state(format!(
                    "avatar session is already {}",
                    session.state
                )));
            }
            let settings = self.settings();
            if let Err(e) = settings.validate() {
                drop(slot);
                let err = AvatarError::from(e);
                self.report(&err);
                return Err(err);
            }
            *slot = Some(Session::opening());
            settings
        };
        self.emit(SessionEvent::PhaseChanged(ControllerPhase::Opening));

        tracing::info!(
            region = %settings.speech_region,
            character = %settings.avatar_character,
            style = %settings.avatar_style,
            "Opening avatar session"
        );

        match self.speech.open_session(&settings.speech()).await {
            Ok(()) => {
                let id = {
                    let mut slot = lock(&self.session);
                    slot.as_mut().map(|session| {
                        session.state = SessionState::Open;
                        session.touch();
                        session.id
                    })
                };
                tracing::info!(session_id = ?id, "Avatar session open");
                self.emit(SessionEvent::PhaseChanged(ControllerPhase::SessionOpen));
                Ok(())
            }
            Err(e) => {
                *lock(&self.session) = None;
                tracing::warn!(error = %e, "Failed to open avatar session");
                self.emit(SessionEvent::PhaseChanged(ControllerPhase::Idle));
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Tear down the avatar session.
    ///
    /// A no-op when idle. Any running turn is cancelled first. The controller
    /// is idle afterwards even if the backend reported an error.
    pub async fn close_avatar_session(&self) -> Result<(), AvatarError> {
        {
            let mut slot = lock(&self.session);
            match slot.as_mut() {
                None => {
                    tracing::debug!("Close requested with no avatar session");
                    return Ok(());
                }
                Some(session)
                    if matches!(session.state, SessionState::Opening | SessionState::Closing) =>
                {
                    return Err(AvatarError::invalid_state(format!(
                        "avatar session is {}",
                        session.state
                    )));
                }
                Some(session) => session.state = SessionState::Closing,
            }
        }
        self.emit(SessionEvent::PhaseChanged(ControllerPhase::Closing));

        self.cancel_turn();
        let result = self.speech.close_session().await;

        let closed = lock(&self.session).take();
        self.emit(SessionEvent::PhaseChanged(ControllerPhase::Idle));

        match result {
            Ok(()) => {
                tracing::info!(session_id = ?closed.map(|s| s.id), "Avatar session closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Avatar session closed with error");
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Apply UI overrides. Only allowed while no session exists.
    pub fn update_settings(&self, overrides: &SettingsOverrides) -> Result<(), AvatarError> {
        let slot = lock(&self.session);
        if let Some(session) = slot.as_ref() {
            return Err(AvatarError::invalid_state(format!(
                "settings are read-only while the avatar session is {}",
                session.state
            )));
        }
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(overrides);
        drop(slot);
        tracing::debug!("Settings overrides applied");
        Ok(())
    }

    // ── Turns ──────────────────────────────────────────────────────

    /// Send one user message and speak the reply.
    ///
    /// Requires an open session and no running turn. Streaming responses
    /// are spoken sentence by sentence as they arrive. A turn that fails or
    /// is cancelled before any content leaves the history untouched; partial
    /// content is kept as an incomplete assistant turn.
    pub async fn send_message(&self, user_text: &str) -> Result<TurnReply, AvatarError> {
        let guard = self.begin_turn()?;

        let text = sanitize_input(user_text);
        if text.is_empty() {
            return Err(AvatarError::InvalidInput("message is empty".to_string()));
        }

        let (snapshot, user_turn, mark) = {
            let mut history = lock(&self.history);
            let snapshot = history.turns().to_vec();
            let mark = history.mark();
            let user_turn = Turn::user(text.clone());
            history.push(user_turn.clone());
            (snapshot, user_turn, mark)
        };
        self.touch_session();

        let (chat_settings, mode) = {
            let settings = self.settings();
            (
                settings.chat(),
                ResponseMode::from_streaming(settings.stream_responses),
            )
        };

        tracing::info!(
            chars = text.chars().count(),
            history_turns = snapshot.len(),
            mode = ?mode,
            grounded = chat_settings.retrieval.is_some(),
            "Sending message"
        );
        self.emit(SessionEvent::PhaseChanged(ControllerPhase::TurnInProgress));
        self.emit(SessionEvent::TurnStarted { text });

        let response = self
            .request_completion(&snapshot, &user_turn, &chat_settings, mode, &guard.token)
            .await;

        let result = match response {
            Ok(Some(ChatResponse::Complete(reply))) => Ok(self.speak_complete(reply, mark, &guard.token)),
            Ok(Some(ChatResponse::Streaming(stream))) => {
                self.speak_streaming(stream, mark, &guard.token).await
            }
            Ok(None) => Ok(self.settle_turn(mark, String::new(), TurnEnd::Cancelled, 0)),
            Err(e) => {
                self.settle_turn(mark, String::new(), TurnEnd::Failed, 0);
                Err(e)
            }
        };

        drop(guard);
        if lock(&self.session).is_some() {
            self.emit(SessionEvent::PhaseChanged(ControllerPhase::SessionOpen));
        }
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "Turn failed");
            self.report(e);
        }
        result
    }

    /// Cancel the running turn, if any. Returns whether one was running.
    pub fn cancel_turn(&self) -> bool {
        match lock(&self.turn).as_ref() {
            Some(token) => {
                tracing::info!("Cancelling turn");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Discard queued speech and halt playback. History and state untouched.
    pub async fn stop_speaking(&self) {
        self.speech.stop().await;
        tracing::debug!("Speech stopped");
        self.emit(SessionEvent::SpeechStopped);
    }

    /// Empty the chat history. The session and in-flight speech are untouched.
    pub fn clear_history(&self) {
        let removed = {
            let mut history = lock(&self.history);
            let removed = history.len();
            history.clear();
            removed
        };
        tracing::info!(removed, "Chat history cleared");
        self.emit(SessionEvent::HistoryCleared);
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn phase(&self) -> ControllerPhase {
        let state = lock(&self.session).as_ref().map(|s| s.state);
        match state {
            None | Some(SessionState::Closed) => ControllerPhase::Idle,
            Some(SessionState::Opening) => ControllerPhase::Opening,
            Some(SessionState::Closing) => ControllerPhase::Closing,
            Some(SessionState::Open) => {
                if lock(&self.turn).is_some() {
                    ControllerPhase::TurnInProgress
                } else {
                    ControllerPhase::SessionOpen
                }
            }
        }
    }

    /// Snapshot of the conversation so far.
    pub fn history(&self) -> Vec<Turn> {
        lock(&self.history).turns().to_vec()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    /// Copy of the effective settings.
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Internal: turn steps ───────────────────────────────────────

    fn begin_turn(&self) -> Result<TurnGuard<'_>, AvatarError> {
        let slot = lock(&self.session);
        match slot.as_ref().map(|s| s.state) {
            Some(SessionState::Open) => {}
            Some(state) => {
                return Err(AvatarError::invalid_state(format!(
                    "avatar session is {state}"
                )));
            }
            None => return Err(AvatarError::invalid_state("no avatar session is open")),
        }

        let mut turn = lock(&self.turn);
        if turn.is_some() {
            return Err(AvatarError::invalid_state("turn in progress"));
        }
        let token = CancellationToken::new();
        *turn = Some(token.clone());
        Ok(TurnGuard {
            slot: &self.turn,
            token,
        })
    }

    /// Call the chat backend, retrying once after a rate limit.
    ///
    /// `Ok(None)` means the turn was cancelled before a response arrived.
    async fn request_completion(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
        mode: ResponseMode,
        cancel: &CancellationToken,
    ) -> Result<Option<ChatResponse>, AvatarError> {
        let mut retried = false;
        loop {
            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.chat.complete(history, user_turn, settings, mode) => Some(result),
            };

            match attempt {
                None => return Ok(None),
                Some(Ok(response)) => return Ok(Some(response)),
                Some(Err(e)) if e.is_retryable() && !retried => {
                    retried = true;
                    let delay = self.config.rate_limit_backoff;
                    tracing::warn!(
                        error = %e,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Chat request rate limited, retrying once"
                    );
                    self.emit(SessionEvent::Retrying { delay });

                    let cancelled = tokio::select! {
                        biased;
                        () = cancel.cancelled() => true,
                        () = tokio::time::sleep(delay) => false,
                    };
                    if cancelled {
                        return Ok(None);
                    }
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }

    fn speak_complete(&self, reply: String, mark: HistoryMark, cancel: &CancellationToken) -> TurnReply {
        self.emit(SessionEvent::Fragment(reply.clone()));

        let mut feed = SpeechFeed::new(self, cancel);
        for unit in split_units(&reply, self.config.segmenter) {
            feed.push(&unit);
        }
        let spoken = feed.spoken;
        self.settle_turn(mark, reply, TurnEnd::Completed, spoken)
    }

    async fn speak_streaming(
        &self,
        mut stream: FragmentStream,
        mark: HistoryMark,
        cancel: &CancellationToken,
    ) -> Result<TurnReply, AvatarError> {
        let mut segmenter = SentenceSegmenter::new(self.config.segmenter);
        let mut feed = SpeechFeed::new(self, cancel);
        let mut text = String::new();

        let outcome = loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    stream.cancel();
                    Some(StreamEnd::Cancelled)
                }
                next = stream.next() => match next {
                    Some(Ok(fragment)) => {
                        if !fragment.is_empty() {
                            text.push_str(&fragment);
                            for unit in segmenter.push(&fragment) {
                                feed.push(&unit);
                            }
                            self.emit(SessionEvent::Fragment(fragment));
                        }
                        None
                    }
                    Some(Err(e)) => Some(StreamEnd::Failed(e)),
                    None => Some(StreamEnd::Finished),
                },
            };
            if let Some(end) = step {
                break end;
            }
        };

        match outcome {
            StreamEnd::Finished => {
                if let Some(rest) = segmenter.finish() {
                    feed.push(&rest);
                }
                let spoken = feed.spoken;
                Ok(self.settle_turn(mark, text, TurnEnd::Completed, spoken))
            }
            StreamEnd::Cancelled => {
                let spoken = feed.spoken;
                Ok(self.settle_turn(mark, text, TurnEnd::Cancelled, spoken))
            }
            StreamEnd::Failed(e) => {
                let spoken = feed.spoken;
                self.settle_turn(mark, text, TurnEnd::Failed, spoken);
                Err(e)
            }
        }
    }

    /// Record the outcome of a turn in the history and emit `TurnFinished`.
    fn settle_turn(&self, mark: HistoryMark, text: String, end: TurnEnd, spoken: usize) -> TurnReply {
        let complete = matches!(end, TurnEnd::Completed);
        {
            let mut history = lock(&self.history);
            if !history.is_current(mark) {
                tracing::debug!("History cleared during turn, assistant turn discarded");
            } else if complete {
                history.push(Turn::assistant(text.clone()));
            } else if text.is_empty() {
                history.rollback(mark);
            } else {
                history.push(Turn::partial_assistant(text.clone()));
            }
        }
        self.touch_session();

        let status = match end {
            TurnEnd::Cancelled => TurnStatus::Cancelled,
            TurnEnd::Completed | TurnEnd::Failed => TurnStatus::Completed,
        };
        if !matches!(end, TurnEnd::Failed) {
            tracing::info!(status = ?status, chars = text.chars().count(), spoken, "Turn finished");
            self.emit(SessionEvent::TurnFinished { status, complete });
        }

        TurnReply {
            text,
            status,
            spoken_units: spoken,
        }
    }

    // ── Internal: helpers ──────────────────────────────────────────

    fn touch_session(&self) {
        if let Some(session) = lock(&self.session).as_mut() {
            session.touch();
        }
    }

    fn report(&self, error: &AvatarError) {
        self.emit(SessionEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Emit a session event (best-effort: a dropped receiver is logged and ignored).
    fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }
}

/// Clears the turn slot when a turn ends, however it ends.
struct TurnGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

#[derive(Debug, Clone, Copy)]
enum TurnEnd {
    Completed,
    Cancelled,
    Failed,
}

enum StreamEnd {
    Finished,
    Cancelled,
    Failed(AvatarError),
}

/// Hands speech units to the avatar for one turn.
///
/// After the first enqueue failure the rest of the turn is silent; the
/// text response still completes.
struct SpeechFeed<'a> {
    controller: &'a SessionController,
    cancel: &'a CancellationToken,
    spoken: usize,
    halted: bool,
}

impl<'a> SpeechFeed<'a> {
    const fn new(controller: &'a SessionController, cancel: &'a CancellationToken) -> Self {
        Self {
            controller,
            cancel,
            spoken: 0,
            halted: false,
        }
    }

    fn push(&mut self, unit: &str) {
        if self.halted || self.cancel.is_cancelled() {
            return;
        }
        let text = speakable(unit);
        if text.is_empty() {
            return;
        }

        let item = SpeechQueueItem::new(text.clone())
            .with_options(self.controller.config.synthesis.clone());
        match self.controller.speech.speak(item) {
            Ok(()) => {
                self.spoken += 1;
                self.controller.touch_session();
                self.controller.emit(SessionEvent::SpeechQueued(text));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech enqueue failed, continuing without speech");
                self.halted = true;
                self.controller.report(&e);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
