//! Chat completion port definition.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::domain::Turn;
use crate::error::AvatarError;
use crate::settings::ChatSettings;

/// Whether the caller wants the whole response or incremental fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Complete,
    Streaming,
}

impl ResponseMode {
    pub const fn from_streaming(streaming: bool) -> Self {
        if streaming {
            Self::Streaming
        } else {
            Self::Complete
        }
    }
}

type BoxedFragments = Pin<Box<dyn Stream<Item = Result<String, AvatarError>> + Send>>;

/// A finite, non-restartable sequence of response fragments.
///
/// Cancelling the stream (directly or through its token) ends it: no
/// fragment is yielded after cancellation, even one already buffered.
pub struct FragmentStream {
    inner: BoxedFragments,
    cancel: CancellationToken,
    finished: bool,
}

impl FragmentStream {
    pub fn new<S>(stream: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<String, AvatarError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            cancel,
            finished: false,
        }
    }

    /// A stream over fragments already in memory.
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Result<String, AvatarError>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(
            futures_util::stream::iter(fragments),
            CancellationToken::new(),
        )
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token shared with the producer; cancelling it ends the stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, AvatarError> {
        use futures_util::StreamExt;

        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, AvatarError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished || this.cancel.is_cancelled() {
            this.finished = true;
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(_)) if this.cancel.is_cancelled() => {
                this.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// The chat backend's answer.
#[derive(Debug)]
pub enum ChatResponse {
    Complete(String),
    Streaming(FragmentStream),
}

/// Port for the chat completion backend.
#[async_trait]
pub trait ChatCompletionPort: Send + Sync {
    /// Send the full history plus the new user turn.
    ///
    /// Attaches the retrieval data source when `settings.retrieval` is set.
    /// Fails with `Auth`, `RateLimited`, `Service` or `Unavailable`.
    async fn complete(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
        mode: ResponseMode,
    ) -> Result<ChatResponse, AvatarError>;
}
