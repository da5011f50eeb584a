//! Wire shapes for Azure OpenAI chat completions.

use avchat_core::{ChatSettings, Turn};
use serde::{Deserialize, Serialize};

/// API version of the extensions route used with a data source attached.
pub const EXTENSIONS_API_VERSION: &str = "2024-02-15-preview";

// ── Request ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: Vec<WireMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<DataSource<'a>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DataSource<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub parameters: SearchParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct SearchParameters<'a> {
    pub endpoint: &'a str,
    pub index_name: &'a str,
    pub authentication: SearchAuthentication<'a>,
    pub query_type: &'static str,
    pub in_scope: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_information: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct SearchAuthentication<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub key: &'a str,
}

/// Build the request body: system prompt, history, then the new user turn.
///
/// With retrieval attached the system prompt travels as the data source's
/// role information instead of a system message.
pub fn build_request<'a>(
    history: &'a [Turn],
    user_turn: &'a Turn,
    settings: &'a ChatSettings,
    stream: bool,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    let prompt = settings.system_prompt.trim();

    if settings.retrieval.is_none() && !prompt.is_empty() {
        messages.push(WireMessage {
            role: "system",
            content: prompt,
        });
    }
    messages.extend(history.iter().chain(std::iter::once(user_turn)).map(|turn| {
        WireMessage {
            role: turn.role.as_str(),
            content: &turn.text,
        }
    }));

    let data_sources = settings.retrieval.as_ref().map(|retrieval| {
        vec![DataSource {
            kind: "azure_search",
            parameters: SearchParameters {
                endpoint: &retrieval.endpoint,
                index_name: &retrieval.index,
                authentication: SearchAuthentication {
                    kind: "api_key",
                    key: &retrieval.key,
                },
                query_type: "simple",
                in_scope: true,
                role_information: (!prompt.is_empty()).then_some(prompt),
            },
        }]
    });

    ChatRequest {
        messages,
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        stream,
        data_sources,
    }
}

/// Completion URL for the deployment, switching to the extensions route
/// when a data source is attached.
pub fn completion_url(settings: &ChatSettings) -> String {
    let base = format!(
        "{}/openai/deployments/{}",
        settings.endpoint, settings.deployment
    );
    if settings.retrieval.is_some() {
        format!("{base}/extensions/chat/completions?api-version={EXTENSIONS_API_VERSION}")
    } else {
        format!(
            "{base}/chat/completions?api-version={}",
            settings.api_version
        )
    }
}

// ── Response ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionChoice {
    pub message: Option<ResponseMessage>,
    /// Extension responses list tool and assistant messages here.
    #[serde(default)]
    pub messages: Vec<ResponseMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Assistant text of the first choice.
    pub fn content(&self) -> Option<String> {
        let choice = self.choices.first()?;
        if let Some(content) = choice.message.as_ref().and_then(|m| m.content.clone()) {
            return Some(content);
        }

        let assistant: Vec<&str> = choice
            .messages
            .iter()
            .filter(|m| m.role.as_deref() == Some("assistant"))
            .filter_map(|m| m.content.as_deref())
            .collect();
        (!assistant.is_empty()).then(|| assistant.concat())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamChoice {
    pub delta: Option<Delta>,
    #[serde(default)]
    pub messages: Vec<StreamMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamMessage {
    pub delta: Option<Delta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl StreamChunk {
    /// Non-empty content deltas in order. Tool deltas (citation payloads)
    /// are skipped.
    pub fn into_fragments(self) -> Vec<String> {
        self.choices
            .into_iter()
            .flat_map(|choice| {
                choice
                    .delta
                    .into_iter()
                    .chain(choice.messages.into_iter().filter_map(|m| m.delta))
            })
            .filter(|delta| delta.role.as_deref() != Some("tool"))
            .filter_map(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use avchat_core::RetrievalSettings;
    use serde_json::{Value, json};
    use tokio_test::assert_ok;

    use super::*;

    fn chat_settings() -> ChatSettings {
        ChatSettings {
            endpoint: "https://contoso.openai.azure.com".to_string(),
            key: "chat-key".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-08-01-preview".to_string(),
            system_prompt: "Be brief.".to_string(),
            max_tokens: 800,
            temperature: 0.5,
            retrieval: None,
        }
    }

    fn with_retrieval(mut settings: ChatSettings) -> ChatSettings {
        settings.retrieval = Some(RetrievalSettings {
            endpoint: "https://contoso.search.windows.net".to_string(),
            key: "search-key".to_string(),
            index: "docs".to_string(),
        });
        settings
    }

    #[test]
    fn test_request_orders_system_history_user() {
        let settings = chat_settings();
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let user = Turn::user("how are you?");

        let body = serde_json::to_value(build_request(&history, &user, &settings, true)).unwrap();
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "how are you?"},
            ])
        );
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 800);
        assert!(body.get("data_sources").is_none());
    }

    #[test]
    fn test_request_with_retrieval_moves_prompt_to_data_source() {
        let settings = with_retrieval(chat_settings());
        let user = Turn::user("what is in the docs?");

        let body: Value =
            serde_json::to_value(build_request(&[], &user, &settings, false)).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);

        let source = &body["data_sources"][0];
        assert_eq!(source["type"], "azure_search");
        assert_eq!(source["parameters"]["index_name"], "docs");
        assert_eq!(source["parameters"]["authentication"]["type"], "api_key");
        assert_eq!(source["parameters"]["authentication"]["key"], "search-key");
        assert_eq!(source["parameters"]["query_type"], "simple");
        assert_eq!(source["parameters"]["in_scope"], true);
        assert_eq!(source["parameters"]["role_information"], "Be brief.");
    }

    #[test]
    fn test_completion_url() {
        assert_eq!(
            completion_url(&chat_settings()),
            "https://contoso.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
        assert_eq!(
            completion_url(&with_retrieval(chat_settings())),
            "https://contoso.openai.azure.com/openai/deployments/gpt-4o/extensions/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_response_content_plain_and_extension() {
        let plain: CompletionResponse = assert_ok!(serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there."}}]
        })));
        assert_eq!(plain.content().as_deref(), Some("Hi there."));

        let extension: CompletionResponse = assert_ok!(serde_json::from_value(json!({
            "choices": [{"messages": [
                {"role": "tool", "content": "{\"citations\": []}"},
                {"role": "assistant", "content": "From the docs [doc1]."}
            ]}]
        })));
        assert_eq!(extension.content().as_deref(), Some("From the docs [doc1]."));

        let empty: CompletionResponse = assert_ok!(serde_json::from_value(json!({"choices": []})));
        assert!(empty.content().is_none());
    }

    #[test]
    fn test_stream_chunk_fragments_skip_tool_deltas() {
        let chunk: StreamChunk = serde_json::from_value(json!({
            "choices": [{"messages": [
                {"delta": {"role": "tool", "content": "{\"citations\": []}"}},
                {"delta": {"content": "Hello"}}
            ]}]
        }))
        .unwrap();
        assert_eq!(chunk.into_fragments(), ["Hello"]);

        let chunk: StreamChunk = serde_json::from_value(json!({
            "choices": [{"delta": {"role": "assistant", "content": ""}}]
        }))
        .unwrap();
        assert!(chunk.into_fragments().is_empty());
    }
}
