//! Connectivity probes for setup verification.

use avchat_core::{Backend, ChatSettings, RetrievalSettings, Turn};
use serde::Deserialize;

use crate::client::{API_KEY_HEADER, AzureChatClient, check_status};
use crate::error::{ChatClientError, ChatResult};
use crate::wire::{CompletionResponse, build_request, completion_url};

/// API version for the search index listing.
pub const SEARCH_API_VERSION: &str = "2023-11-01";

/// Token budget of the chat probe.
const PROBE_MAX_TOKENS: u32 = 5;

/// What the search probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchProbe {
    pub indexes: Vec<String>,
    pub index_found: bool,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    value: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
}

/// Send a tiny completion without retrieval to check endpoint, key and
/// deployment.
pub async fn probe_chat(client: &AzureChatClient, settings: &ChatSettings) -> ChatResult<()> {
    let settings = ChatSettings {
        retrieval: None,
        max_tokens: PROBE_MAX_TOKENS,
        ..settings.clone()
    };
    let greeting = Turn::user("Hello");
    let url = completion_url(&settings);
    let body = build_request(&[], &greeting, &settings, false);

    tracing::debug!(url = %url, "Probing chat deployment");
    let response = client
        .http()
        .post(&url)
        .header(API_KEY_HEADER, &settings.key)
        .json(&body)
        .send()
        .await
        .map_err(|e| ChatClientError::network(Backend::Chat, e))?;
    let response: CompletionResponse = check_status(response, Backend::Chat)
        .await?
        .json()
        .await
        .map_err(|e| ChatClientError::invalid_response(Backend::Chat, e.to_string()))?;

    if response.choices.is_empty() {
        return Err(ChatClientError::invalid_response(
            Backend::Chat,
            "probe returned no choices",
        ));
    }
    Ok(())
}

/// List the search service's indexes and look for the configured one.
pub async fn probe_search(
    client: &AzureChatClient,
    retrieval: &RetrievalSettings,
) -> ChatResult<SearchProbe> {
    let url = format!(
        "{}/indexes?api-version={SEARCH_API_VERSION}&$select=name",
        retrieval.endpoint.trim_end_matches('/')
    );

    tracing::debug!(url = %url, "Probing search service");
    let response = client
        .http()
        .get(&url)
        .header(API_KEY_HEADER, &retrieval.key)
        .send()
        .await
        .map_err(|e| ChatClientError::network(Backend::Search, e))?;
    let list: IndexList = check_status(response, Backend::Search)
        .await?
        .json()
        .await
        .map_err(|e| ChatClientError::invalid_response(Backend::Search, e.to_string()))?;

    let indexes: Vec<String> = list.value.into_iter().map(|entry| entry.name).collect();
    let index_found = indexes.iter().any(|name| name == &retrieval.index);
    Ok(SearchProbe {
        indexes,
        index_found,
    })
}
