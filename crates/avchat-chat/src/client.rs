//! Azure OpenAI chat completion client.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use avchat_core::text::strip_citations;
use avchat_core::{
    AvatarError, Backend, ChatCompletionPort, ChatResponse, ChatSettings, FragmentStream,
    ResponseMode, Turn,
};
use futures_util::{Stream, StreamExt};
use reqwest::{Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::citations::CitationFilter;
use crate::error::{ChatClientError, ChatResult};
use crate::sse::{SseData, SseDecoder};
use crate::wire::{CompletionResponse, StreamChunk, build_request, completion_url};

/// Header carrying the Azure OpenAI / Azure AI Search key.
pub(crate) const API_KEY_HEADER: &str = "api-key";

/// Non-streaming requests give up after this long.
const COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat client for an Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new() -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("avchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatClientError::network(Backend::Chat, e))?;
        Ok(Self::with_client(client))
    }

    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.client
    }

    async fn send(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
        stream: bool,
    ) -> ChatResult<Response> {
        let url = completion_url(settings);
        let body = build_request(history, user_turn, settings, stream);

        tracing::debug!(
            deployment = %settings.deployment,
            history = history.len(),
            retrieval = settings.retrieval.is_some(),
            stream,
            "Sending chat completion request"
        );

        let mut request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &settings.key)
            .json(&body);
        if !stream {
            request = request.timeout(COMPLETE_TIMEOUT);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChatClientError::network(Backend::Chat, e))?;
        check_status(response, Backend::Chat).await
    }

    /// Request the whole response at once, citation markers removed.
    pub async fn complete_text(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
    ) -> ChatResult<String> {
        let response = self.send(history, user_turn, settings, false).await?;
        let body: CompletionResponse = response.json().await.map_err(|e| {
            ChatClientError::invalid_response(Backend::Chat, format!("malformed body: {e}"))
        })?;
        let content = body
            .content()
            .ok_or_else(|| ChatClientError::invalid_response(Backend::Chat, "no assistant message"))?;
        Ok(strip_citations(&content))
    }

    /// Request a streamed response as a cancellable fragment stream.
    pub async fn complete_stream(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
    ) -> ChatResult<FragmentStream> {
        let response = self.send(history, user_turn, settings, true).await?;
        let cancel = CancellationToken::new();
        Ok(FragmentStream::new(
            fragments(response, cancel.clone()),
            cancel,
        ))
    }
}

#[async_trait]
impl ChatCompletionPort for AzureChatClient {
    async fn complete(
        &self,
        history: &[Turn],
        user_turn: &Turn,
        settings: &ChatSettings,
        mode: ResponseMode,
    ) -> Result<ChatResponse, AvatarError> {
        let response = match mode {
            ResponseMode::Complete => self
                .complete_text(history, user_turn, settings)
                .await
                .map(ChatResponse::Complete),
            ResponseMode::Streaming => self
                .complete_stream(history, user_turn, settings)
                .await
                .map(ChatResponse::Streaming),
        };
        response.map_err(|e| {
            tracing::warn!(error = %e, "Chat completion failed");
            e.into()
        })
    }
}

/// Decode an SSE response body into content fragments.
///
/// Stops reading as soon as `cancel` fires. Malformed chunks are skipped.
fn fragments(
    response: Response,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String, AvatarError>> + Send {
    stream! {
        let mut body = response.bytes_stream().boxed();
        let mut decoder = SseDecoder::new();
        let mut citations = CitationFilter::new();
        let mut count = 0usize;

        loop {
            let Some(next) = cancel.run_until_cancelled(body.next()).await else {
                tracing::debug!(fragments = count, "Chat stream cancelled");
                return;
            };

            let (events, mut done) = match next {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(ChatClientError::network(Backend::Chat, e).into());
                    return;
                }
                None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
            };

            for event in events {
                let data = match event {
                    SseData::Done => {
                        done = true;
                        break;
                    }
                    SseData::Payload(data) => data,
                };
                let chunk = match serde_json::from_str::<StreamChunk>(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping malformed stream chunk");
                        continue;
                    }
                };
                for fragment in chunk.into_fragments() {
                    let clean = citations.push(&fragment);
                    if !clean.is_empty() {
                        count += 1;
                        yield Ok(clean);
                    }
                }
            }

            if done {
                break;
            }
        }

        let rest = citations.finish();
        if !rest.is_empty() {
            count += 1;
            yield Ok(rest);
        }
        tracing::debug!(fragments = count, "Chat stream finished");
    }
}

/// Map a non-success status to a typed error.
pub(crate) async fn check_status(response: Response, service: Backend) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ChatClientError::Unauthorized {
            service,
            status: status.as_u16(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(ChatClientError::RateLimited {
            service,
            retry_after: retry_after(&response),
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ChatClientError::api_failure(service, status.as_u16(), &body))
        }
    }
}

/// `retry-after-ms` (sent by Azure OpenAI) or `Retry-After` in seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    header("retry-after-ms")
        .map(Duration::from_millis)
        .or_else(|| header("retry-after").map(Duration::from_secs))
}
