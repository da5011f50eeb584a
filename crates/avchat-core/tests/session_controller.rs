//! Integration tests for the `SessionController`.
//!
//! These tests drive the controller through full turns using hand-written
//! speech and chat backends. No network access is required: the chat fake
//! replays a script and the speech fake records what it was asked to say.
//!
//! # What is tested
//!
//! - Open/close lifecycle guards
//! - History bookkeeping across successful, failed and cancelled turns
//! - Streaming and complete responses producing the same turn
//! - The single rate-limit retry
//! - Event emission

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use avchat_core::{
    AvatarError, Backend, ChatCompletionPort, ChatResponse, ControllerConfig, ControllerPhase,
    ErrorKind, FragmentStream, ResponseMode, SessionController, SessionEvent, SessionState,
    Settings, SpeechAvatarPort, SpeechQueueItem, SpeechSettings, Turn, TurnRole, TurnStatus,
    settings::ChatSettings,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Fake backends ──────────────────────────────────────────────────

/// Speech backend that records queued text instead of speaking it.
#[derive(Default)]
struct FakeSpeech {
    state: Mutex<Option<SessionState>>,
    spoken: Mutex<Vec<String>>,
    opens: Mutex<usize>,
    stops: Mutex<usize>,
    fail_open: Option<fn() -> AvatarError>,
}

impl FakeSpeech {
    fn failing_open(make: fn() -> AvatarError) -> Self {
        Self {
            fail_open: Some(make),
            ..Self::default()
        }
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechAvatarPort for FakeSpeech {
    async fn open_session(&self, _settings: &SpeechSettings) -> Result<(), AvatarError> {
        *self.opens.lock().unwrap() += 1;
        if let Some(make) = self.fail_open {
            return Err(make());
        }
        *self.state.lock().unwrap() = Some(SessionState::Open);
        Ok(())
    }

    fn speak(&self, item: SpeechQueueItem) -> Result<(), AvatarError> {
        if self.state() != SessionState::Open {
            return Err(AvatarError::invalid_state("no avatar session is open"));
        }
        self.spoken.lock().unwrap().push(item.text);
        Ok(())
    }

    async fn stop(&self) {
        *self.stops.lock().unwrap() += 1;
    }

    async fn close_session(&self) -> Result<(), AvatarError> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.state.lock().unwrap().unwrap_or(SessionState::Closed)
    }
}

/// One scripted answer from the chat fake.
enum Script {
    /// Answer with the full text; streamed word by word in streaming mode.
    Reply(&'static str),
    /// Stream whatever the test pushes through the channel.
    Channel(mpsc::UnboundedReceiver<Result<String, AvatarError>>),
    RateLimited,
    Fail(fn() -> AvatarError),
    /// Never answer.
    Hang,
}

/// A recorded request.
struct Request {
    history: Vec<Turn>,
    user_turn: Turn,
    mode: ResponseMode,
}

#[derive(Default)]
struct ScriptedChat {
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedChat {
    fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Split text into word-sized fragments, keeping the separating spaces.
fn fragments_of(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl ChatCompletionPort for ScriptedChat {
    async fn complete(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        _settings: &ChatSettings,
        mode: ResponseMode,
    ) -> Result<ChatResponse, AvatarError> {
        self.requests.lock().unwrap().push(Request {
            history: history.to_vec(),
            user_turn: user_turn.clone(),
            mode,
        });
        let next = self.script.lock().unwrap().pop_front();

        match next.expect("chat script exhausted") {
            Script::Reply(text) => Ok(match mode {
                ResponseMode::Complete => ChatResponse::Complete(text.to_string()),
                ResponseMode::Streaming => ChatResponse::Streaming(FragmentStream::from_fragments(
                    fragments_of(text).into_iter().map(Ok).collect::<Vec<_>>(),
                )),
            }),
            Script::Channel(rx) => {
                let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Ok(ChatResponse::Streaming(FragmentStream::new(
                    stream,
                    CancellationToken::new(),
                )))
            }
            Script::RateLimited => Err(AvatarError::rate_limited(
                Backend::Chat,
                Some(Duration::from_secs(1)),
                "429 Too Many Requests",
            )),
            Script::Fail(make) => Err(make()),
            Script::Hang => std::future::pending().await,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn settings(stream: bool) -> Settings {
    Settings {
        speech_key: "speech-key".to_string(),
        chat_endpoint: "https://demo.openai.azure.com".to_string(),
        chat_key: "chat-key".to_string(),
        chat_deployment: "gpt-4o".to_string(),
        stream_responses: stream,
        ..Settings::default()
    }
}

struct Harness {
    controller: Arc<SessionController>,
    speech: Arc<FakeSpeech>,
    chat: Arc<ScriptedChat>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

fn harness(stream: bool, speech: FakeSpeech, chat: ScriptedChat) -> Harness {
    let speech = Arc::new(speech);
    let chat = Arc::new(chat);
    let (controller, events) = SessionController::new(
        settings(stream),
        Arc::clone(&speech) as Arc<dyn SpeechAvatarPort>,
        Arc::clone(&chat) as Arc<dyn ChatCompletionPort>,
        ControllerConfig::default(),
    );
    Harness {
        controller: Arc::new(controller),
        speech,
        chat,
        events,
    }
}

async fn open_harness(stream: bool, script: impl IntoIterator<Item = Script>) -> Harness {
    let h = harness(stream, FakeSpeech::default(), ScriptedChat::new(script));
    h.controller.open_avatar_session().await.unwrap();
    h
}

/// Drain all pending events from the event receiver and return them.
fn drain_events(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

/// Collect only the phases from `PhaseChanged` events.
fn phases_from(events: &[SessionEvent]) -> Vec<ControllerPhase> {
    events
        .iter()
        .filter_map(|e| {
            if let SessionEvent::PhaseChanged(p) = e {
                Some(*p)
            } else {
                None
            }
        })
        .collect()
}

/// Wait until the next `Fragment` event arrives.
async fn next_fragment(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(SessionEvent::Fragment(text)) => return text,
                Some(_) => {}
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("no fragment event")
}

async fn wait_for_phase(controller: &SessionController, phase: ControllerPhase) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.phase() != phase {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("phase never reached");
}

fn roles(history: &[Turn]) -> Vec<TurnRole> {
    history.iter().map(|t| t.role).collect()
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn double_open_is_invalid_state() {
    let h = open_harness(true, []).await;

    let err = h.controller.open_avatar_session().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(*h.speech.opens.lock().unwrap(), 1);
    assert_eq!(h.controller.phase(), ControllerPhase::SessionOpen);
}

#[tokio::test]
async fn open_failure_returns_specific_error_and_stays_idle() {
    let h = harness(
        true,
        FakeSpeech::failing_open(|| AvatarError::unavailable(Backend::Speech, "region offline")),
        ScriptedChat::default(),
    );

    let err = h.controller.open_avatar_session().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(h.controller.session().is_none());
    assert_eq!(h.controller.phase(), ControllerPhase::Idle);
}

#[tokio::test]
async fn close_twice_succeeds() {
    let h = open_harness(true, []).await;

    h.controller.close_avatar_session().await.unwrap();
    h.controller.close_avatar_session().await.unwrap();

    assert_eq!(h.controller.phase(), ControllerPhase::Idle);
    assert_eq!(h.speech.state(), SessionState::Closed);
}

#[tokio::test]
async fn close_when_never_opened_is_noop() {
    let h = harness(true, FakeSpeech::default(), ScriptedChat::default());
    h.controller.close_avatar_session().await.unwrap();
    assert_eq!(h.controller.phase(), ControllerPhase::Idle);
}

#[tokio::test]
async fn session_records_timestamps() {
    let h = open_harness(false, [Script::Reply("Fine, thank you very much.")]).await;
    let opened = h.controller.session().unwrap();
    assert_eq!(opened.state, SessionState::Open);

    h.controller.send_message("how are you").await.unwrap();

    let after = h.controller.session().unwrap();
    assert_eq!(after.id, opened.id);
    assert!(after.last_activity >= opened.last_activity);
    assert_eq!(after.created_at, opened.created_at);
}

#[tokio::test]
async fn phase_events_follow_lifecycle() {
    let mut h = open_harness(false, [Script::Reply("Sure thing, here you go.")]).await;
    h.controller.send_message("hello").await.unwrap();
    h.controller.close_avatar_session().await.unwrap();

    let events = drain_events(&mut h.events);
    assert_eq!(
        phases_from(&events),
        vec![
            ControllerPhase::Opening,
            ControllerPhase::SessionOpen,
            ControllerPhase::TurnInProgress,
            ControllerPhase::SessionOpen,
            ControllerPhase::Closing,
            ControllerPhase::Idle,
        ]
    );
    assert!(events.contains(&SessionEvent::TurnFinished {
        status: TurnStatus::Completed,
        complete: true,
    }));
}

// ── Turns ──────────────────────────────────────────────────────────

#[tokio::test]
async fn send_while_closed_is_invalid_state_and_history_unchanged() {
    let h = harness(true, FakeSpeech::default(), ScriptedChat::default());

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(h.controller.history().is_empty());
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn clear_then_send_has_exactly_one_user_turn() {
    let h = open_harness(
        false,
        [
            Script::Reply("First answer for you."),
            Script::Reply("Hello to you as well."),
        ],
    )
    .await;
    h.controller.send_message("earlier question").await.unwrap();

    h.controller.clear_history();
    h.controller.send_message("hi").await.unwrap();

    let history = h.controller.history();
    assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
    assert_eq!(history[0].text, "hi");
    assert_eq!(history[1].text, "Hello to you as well.");

    let requests = h.chat.requests.lock().unwrap();
    assert!(requests[1].history.is_empty());
    assert_eq!(requests[1].user_turn.text, "hi");
}

#[tokio::test]
async fn history_is_replayed_on_every_request() {
    let h = open_harness(
        true,
        [
            Script::Reply("Paris is the capital of France."),
            Script::Reply("About two million people live there."),
        ],
    )
    .await;

    h.controller.send_message("capital of France?").await.unwrap();
    h.controller.send_message("population?").await.unwrap();

    let requests = h.chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].mode, ResponseMode::Streaming);
    let replayed: Vec<&str> = requests[1].history.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(
        replayed,
        vec!["capital of France?", "Paris is the capital of France."]
    );
}

#[tokio::test]
async fn streaming_and_complete_produce_the_same_turn() {
    const REPLY: &str = "The weather is sunny today. Expect a light breeze this afternoon!";

    let complete = open_harness(false, [Script::Reply(REPLY)]).await;
    let streaming = open_harness(true, [Script::Reply(REPLY)]).await;

    let a = complete.controller.send_message("weather?").await.unwrap();
    let b = streaming.controller.send_message("weather?").await.unwrap();

    assert_eq!(a.text, REPLY);
    assert_eq!(b.text, REPLY);
    assert_eq!(complete.controller.history()[1].text, streaming.controller.history()[1].text);
    assert_eq!(complete.speech.spoken(), streaming.speech.spoken());
    assert_eq!(
        streaming.speech.spoken(),
        vec![
            "The weather is sunny today.",
            "Expect a light breeze this afternoon!"
        ]
    );
}

#[tokio::test]
async fn streamed_fragments_are_emitted_in_order() {
    let mut h = open_harness(true, [Script::Reply("One two three four.")]).await;
    h.controller.send_message("count").await.unwrap();

    let fragments: String = drain_events(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Fragment(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(fragments, "One two three four.");
}

#[tokio::test]
async fn concurrent_send_is_rejected() {
    let (_tx, rx) = mpsc::unbounded_channel();
    let h = open_harness(true, [Script::Channel(rx)]).await;

    let first = {
        let controller = Arc::clone(&h.controller);
        tokio::spawn(async move { controller.send_message("first").await })
    };
    wait_for_phase(&h.controller, ControllerPhase::TurnInProgress).await;

    let err = h.controller.send_message("second").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(err.to_string().contains("turn in progress"));

    assert!(h.controller.cancel_turn());
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn service_error_before_content_leaves_history_unchanged() {
    let h = open_harness(
        true,
        [Script::Fail(|| AvatarError::service(Backend::Chat, "status 500"))],
    )
    .await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    assert!(h.controller.history().is_empty());
    assert_eq!(h.controller.phase(), ControllerPhase::SessionOpen);
}

#[tokio::test]
async fn auth_error_is_returned_unmodified_without_retry() {
    let h = open_harness(
        false,
        [Script::Fail(|| AvatarError::auth(Backend::Chat, "invalid key"))],
    )
    .await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert!(matches!(err, AvatarError::Auth { service: Backend::Chat, .. }));
    assert_eq!(h.chat.calls(), 1);
}

#[tokio::test]
async fn stream_failure_keeps_partial_content_marked_incomplete() {
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(Ok("Partial answer so far. ".to_string())).unwrap();
    tx.send(Err(AvatarError::service(Backend::Chat, "connection reset")))
        .unwrap();
    let h = open_harness(true, [Script::Channel(rx)]).await;

    let err = h.controller.send_message("tell me").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    let history = h.controller.history();
    assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
    assert_eq!(history[1].text, "Partial answer so far. ");
    assert!(!history[1].complete);
    assert_eq!(h.speech.spoken(), vec!["Partial answer so far."]);
}

// ── Rate limiting ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rate_limit_then_success_retries_once() {
    let mut h = open_harness(
        false,
        [Script::RateLimited, Script::Reply("Sorry for the wait, here it is.")],
    )
    .await;

    let reply = h.controller.send_message("hello").await.unwrap();

    assert_eq!(reply.status, TurnStatus::Completed);
    assert_eq!(h.chat.calls(), 2);
    let history = h.controller.history();
    assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
    assert!(
        drain_events(&mut h.events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Retrying { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_surfaces() {
    let h = open_harness(
        false,
        [
            Script::RateLimited,
            Script::RateLimited,
            Script::Reply("never reached"),
        ],
    )
    .await;

    let err = h.controller.send_message("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(h.chat.calls(), 2);
    assert!(h.controller.history().is_empty());
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn cancel_before_content_rolls_back_user_turn() {
    let h = open_harness(true, [Script::Hang]).await;

    let turn = {
        let controller = Arc::clone(&h.controller);
        tokio::spawn(async move { controller.send_message("are you there?").await })
    };
    wait_for_phase(&h.controller, ControllerPhase::TurnInProgress).await;
    assert!(h.controller.cancel_turn());

    let reply = turn.await.unwrap().unwrap();
    assert_eq!(reply.status, TurnStatus::Cancelled);
    assert!(reply.text.is_empty());
    assert!(h.controller.history().is_empty());
    assert_eq!(h.controller.phase(), ControllerPhase::SessionOpen);
}

#[tokio::test]
async fn cancel_mid_stream_keeps_partial_and_stops_speech() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut h = open_harness(true, [Script::Channel(rx)]).await;

    let turn = {
        let controller = Arc::clone(&h.controller);
        tokio::spawn(async move { controller.send_message("story please").await })
    };
    tx.send(Ok("Once upon a time. ".to_string())).unwrap();
    assert_eq!(next_fragment(&mut h.events).await, "Once upon a time. ");

    assert!(h.controller.cancel_turn());
    tx.send(Ok("There was a dragon. ".to_string())).ok();

    let reply = turn.await.unwrap().unwrap();
    assert_eq!(reply.status, TurnStatus::Cancelled);
    assert_eq!(reply.text, "Once upon a time. ");

    let history = h.controller.history();
    assert_eq!(roles(&history), vec![TurnRole::User, TurnRole::Assistant]);
    assert!(!history[1].complete);
    assert_eq!(h.speech.spoken(), vec!["Once upon a time."]);
}

#[tokio::test]
async fn cancel_without_turn_returns_false() {
    let h = open_harness(true, []).await;
    assert!(!h.controller.cancel_turn());
}

#[tokio::test]
async fn clear_during_turn_discards_assistant_turn() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut h = open_harness(true, [Script::Channel(rx)]).await;

    let turn = {
        let controller = Arc::clone(&h.controller);
        tokio::spawn(async move { controller.send_message("question").await })
    };
    tx.send(Ok("An answer. ".to_string())).unwrap();
    next_fragment(&mut h.events).await;

    h.controller.clear_history();
    drop(tx);

    let reply = turn.await.unwrap().unwrap();
    assert_eq!(reply.status, TurnStatus::Completed);
    assert!(h.controller.history().is_empty());
}

#[tokio::test]
async fn close_during_turn_cancels_it() {
    let h = open_harness(true, [Script::Hang]).await;

    let turn = {
        let controller = Arc::clone(&h.controller);
        tokio::spawn(async move { controller.send_message("hello").await })
    };
    wait_for_phase(&h.controller, ControllerPhase::TurnInProgress).await;

    h.controller.close_avatar_session().await.unwrap();

    let reply = turn.await.unwrap().unwrap();
    assert_eq!(reply.status, TurnStatus::Cancelled);
    assert_eq!(h.controller.phase(), ControllerPhase::Idle);
}

// ── Speech control ─────────────────────────────────────────────────

#[tokio::test]
async fn stop_speaking_on_empty_queue_leaves_state_unchanged() {
    let h = open_harness(true, []).await;

    h.controller.stop_speaking().await;

    assert_eq!(*h.speech.stops.lock().unwrap(), 1);
    assert_eq!(h.controller.phase(), ControllerPhase::SessionOpen);
    assert!(h.controller.history().is_empty());
}

#[tokio::test]
async fn stop_speaking_while_idle_succeeds() {
    let h = harness(true, FakeSpeech::default(), ScriptedChat::default());
    h.controller.stop_speaking().await;
    assert_eq!(h.controller.phase(), ControllerPhase::Idle);
}

#[tokio::test]
async fn markdown_is_not_spoken() {
    let h = open_harness(
        false,
        [Script::Reply("**Step one:** open the [portal](https://portal.azure.com).")],
    )
    .await;

    h.controller.send_message("how?").await.unwrap();

    assert_eq!(h.speech.spoken(), vec!["Step one: open the portal."]);
    assert!(h.controller.history()[1].text.starts_with("**Step one:**"));
}
