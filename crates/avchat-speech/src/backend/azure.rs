//! Azure Speech avatar backend.
//!
//! Connect issues a short-lived auth token from the regional (or private)
//! endpoint and fetches the avatar relay credentials. Each utterance is
//! posted as SSML to the TTS REST endpoint and the returned audio is handed
//! to the configured [`AudioOutput`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use avchat_core::SpeechSettings;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Response, StatusCode};

use super::{AvatarBackend, AvatarConnection, RelayToken};
use crate::error::{SpeechClientError, SpeechResult};
use crate::output::{AudioOutput, OUTPUT_FORMAT};

/// Header carrying the subscription key.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Issued tokens are valid for ten minutes; refresh a little earlier.
pub const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(9 * 60);

const CLIENT_USER_AGENT: &str = concat!("avchat/", env!("CARGO_PKG_VERSION"));

struct Connected {
    settings: SpeechSettings,
    token: String,
    issued_at: Instant,
}

/// Production backend talking to Azure Speech over REST.
pub struct AzureAvatarBackend {
    client: reqwest::Client,
    output: Arc<dyn AudioOutput>,
    connection: Mutex<Option<Connected>>,
}

impl AzureAvatarBackend {
    /// Create a backend with its own HTTP client.
    pub fn new(output: Arc<dyn AudioOutput>) -> SpeechResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(CLIENT_USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, output))
    }

    /// Create a backend reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            client,
            output,
            connection: Mutex::new(None),
        }
    }

    /// Check that the key and region are accepted by issuing a token.
    pub async fn probe(&self, settings: &SpeechSettings) -> SpeechResult<()> {
        self.issue_token(settings).await.map(|_| ())
    }

    /// Exchange the subscription key for a bearer token.
    pub async fn issue_token(&self, settings: &SpeechSettings) -> SpeechResult<String> {
        let url = settings.token_url();
        tracing::debug!(url = %url, "Issuing speech token");

        let response = self
            .client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &settings.key)
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;
        let token = check_status(response, &url).await?.text().await?;

        if token.trim().is_empty() {
            return Err(SpeechClientError::InvalidResponse {
                message: "empty token".to_string(),
            });
        }
        Ok(token.trim().to_string())
    }

    /// Fetch the ICE relay credentials used by the avatar video stream.
    pub async fn fetch_relay_token(&self, settings: &SpeechSettings) -> SpeechResult<RelayToken> {
        let url = settings.avatar_relay_token_url();
        tracing::debug!(url = %url, "Fetching avatar relay token");

        let response = self
            .client
            .get(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &settings.key)
            .send()
            .await?;
        check_status(response, &url)
            .await?
            .json::<RelayToken>()
            .await
            .map_err(|e| SpeechClientError::InvalidResponse {
                message: format!("relay token: {e}"),
            })
    }

    /// Current settings and a valid token, refreshing the token if stale.
    async fn credentials(&self) -> SpeechResult<(SpeechSettings, String)> {
        let (settings, token, stale) = {
            let guard = self.lock_connection();
            let connected = guard.as_ref().ok_or(SpeechClientError::NotConnected)?;
            (
                connected.settings.clone(),
                connected.token.clone(),
                connected.issued_at.elapsed() >= TOKEN_REFRESH_AFTER,
            )
        };
        if !stale {
            return Ok((settings, token));
        }

        tracing::debug!("Refreshing speech token");
        let token = self.issue_token(&settings).await?;
        if let Some(connected) = self.lock_connection().as_mut() {
            connected.token.clone_from(&token);
            connected.issued_at = Instant::now();
        }
        Ok((settings, token))
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, Option<Connected>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AvatarBackend for AzureAvatarBackend {
    async fn connect(&self, settings: &SpeechSettings) -> SpeechResult<AvatarConnection> {
        let token = self.issue_token(settings).await?;

        // Synthesis works without the relay, only the video stream needs it
        let relay = match self.fetch_relay_token(settings).await {
            Ok(relay) => Some(relay),
            Err(e @ SpeechClientError::Unauthorized { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Avatar relay token unavailable, continuing without video relay");
                None
            }
        };

        *self.lock_connection() = Some(Connected {
            settings: settings.clone(),
            token,
            issued_at: Instant::now(),
        });

        tracing::info!(
            region = %settings.region,
            character = %settings.character,
            style = %settings.style,
            relay = relay.is_some(),
            "Connected to Azure avatar"
        );
        Ok(AvatarConnection {
            relay,
            character: settings.character.clone(),
            style: settings.style.clone(),
        })
    }

    async fn speak(&self, ssml: &str) -> SpeechResult<()> {
        let (settings, token) = self.credentials().await?;
        let url = settings.tts_url();

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(ssml.to_string())
            .send()
            .await?;
        let audio = check_status(response, &url).await?.bytes().await?;

        tracing::trace!(bytes = audio.len(), "Synthesized utterance");
        self.output.play(audio).await
    }

    async fn stop_speaking(&self) -> SpeechResult<()> {
        self.output.stop();
        Ok(())
    }

    async fn disconnect(&self) {
        self.output.stop();
        if self.lock_connection().take().is_some() {
            tracing::debug!("Disconnected from Azure avatar");
        }
    }
}

/// Map a non-success status to a typed error.
async fn check_status(response: Response, url: &str) -> SpeechResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SpeechClientError::Unauthorized {
            status: status.as_u16(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(SpeechClientError::Throttled {
            retry_after: retry_after(&response),
        }),
        _ => {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), body = %body, "Speech request failed");
            Err(SpeechClientError::ApiRequestFailed {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
