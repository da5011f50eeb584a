//! Settings domain types, loading and validation.
//!
//! Settings are read once from a flat key/value source (the process
//! environment in production, a closure in tests), merged with explicit
//! overrides from the UI, and then treated as read-only.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default Azure Speech region.
pub const DEFAULT_SPEECH_REGION: &str = "westus2";

/// Default neural voice used for synthesis.
pub const DEFAULT_TTS_VOICE: &str = "en-US-AvaMultilingualNeural";

/// Default avatar character and style.
pub const DEFAULT_AVATAR_CHARACTER: &str = "lisa";
pub const DEFAULT_AVATAR_STYLE: &str = "casual";

/// Default avatar background colour (RGBA hex).
pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFFFF";

/// Default Azure `OpenAI` REST API version.
pub const DEFAULT_CHAT_API_VERSION: &str = "2024-08-01-preview";

/// Default system prompt sent ahead of the conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI assistant that helps people find information.";

/// Default speech recognition locales, in priority order.
pub const DEFAULT_STT_LOCALES: &str = "en-US,de-DE,es-ES,fr-FR,it-IT,ja-JP,ko-KR,zh-CN";

pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Regions where the talking avatar is commonly deployed.
pub const COMMON_SPEECH_REGIONS: &[&str] = &[
    "westus",
    "westus2",
    "eastus",
    "eastus2",
    "centralus",
    "northeurope",
    "westeurope",
    "southeastasia",
    "eastasia",
    "japaneast",
    "australiaeast",
    "swedencentral",
];

/// Prebuilt avatar characters.
pub const STANDARD_AVATAR_CHARACTERS: &[&str] = &["lisa", "anna", "meg"];

/// A named setting, used to report validation problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsField {
    SpeechKey,
    SpeechRegion,
    SpeechPrivateEndpoint,
    ChatEndpoint,
    ChatKey,
    ChatDeployment,
    ChatApiVersion,
    SearchEndpoint,
    SearchKey,
    SearchIndex,
    TtsVoice,
    AvatarCharacter,
    MaxTokens,
    Temperature,
}

impl SettingsField {
    /// Environment variable the field is loaded from.
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::SpeechKey => "AZURE_SPEECH_KEY",
            Self::SpeechRegion => "AZURE_SPEECH_REGION",
            Self::SpeechPrivateEndpoint => "AZURE_SPEECH_PRIVATE_ENDPOINT",
            Self::ChatEndpoint => "AZURE_OPENAI_ENDPOINT",
            Self::ChatKey => "AZURE_OPENAI_KEY",
            Self::ChatDeployment => "AZURE_OPENAI_DEPLOYMENT",
            Self::ChatApiVersion => "AZURE_OPENAI_API_VERSION",
            Self::SearchEndpoint => "AZURE_SEARCH_ENDPOINT",
            Self::SearchKey => "AZURE_SEARCH_KEY",
            Self::SearchIndex => "AZURE_SEARCH_INDEX",
            Self::TtsVoice => "TTS_VOICE",
            Self::AvatarCharacter => "AVATAR_CHARACTER",
            Self::MaxTokens => "CHAT_MAX_TOKENS",
            Self::Temperature => "CHAT_TEMPERATURE",
        }
    }

    /// Human readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SpeechKey => "Azure Speech key",
            Self::SpeechRegion => "Azure Speech region",
            Self::SpeechPrivateEndpoint => "Azure Speech private endpoint",
            Self::ChatEndpoint => "Azure OpenAI endpoint",
            Self::ChatKey => "Azure OpenAI key",
            Self::ChatDeployment => "Azure OpenAI deployment",
            Self::ChatApiVersion => "Azure OpenAI API version",
            Self::SearchEndpoint => "Azure Search endpoint",
            Self::SearchKey => "Azure Search key",
            Self::SearchIndex => "Azure Search index",
            Self::TtsVoice => "TTS voice",
            Self::AvatarCharacter => "Avatar character",
            Self::MaxTokens => "Max tokens",
            Self::Temperature => "Temperature",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_var())
    }
}

/// One validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    Missing(SettingsField),
    Invalid { field: SettingsField, reason: String },
}

impl FieldIssue {
    pub const fn field(&self) -> SettingsField {
        match self {
            Self::Missing(field) | Self::Invalid { field, .. } => *field,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{field} is required"),
            Self::Invalid { field, reason } => write!(f, "{field} is invalid: {reason}"),
        }
    }
}

/// Settings failed validation. Carries every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {}", describe_issues(.issues))]
pub struct ConfigError {
    pub issues: Vec<FieldIssue>,
}

impl ConfigError {
    /// Fields reported as missing, in check order.
    pub fn missing_fields(&self) -> Vec<SettingsField> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                FieldIssue::Missing(field) => Some(*field),
                FieldIssue::Invalid { .. } => None,
            })
            .collect()
    }
}

fn describe_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Non-fatal configuration warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub field: SettingsField,
    pub message: String,
}

/// Complete application settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub speech_key: String,
    pub speech_region: String,
    pub speech_private_endpoint: Option<String>,
    pub use_private_endpoint: bool,
    pub tts_voice: String,
    pub stt_locales: Vec<String>,
    pub avatar_character: String,
    pub avatar_style: String,
    pub avatar_background_color: String,

    pub chat_endpoint: String,
    pub chat_key: String,
    pub chat_deployment: String,
    pub chat_api_version: String,
    pub system_prompt: String,
    pub stream_responses: bool,
    pub max_tokens: u32,
    pub temperature: f32,

    pub search_endpoint: Option<String>,
    pub search_key: Option<String>,
    pub search_index: Option<String>,
    pub enable_search: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speech_key: String::new(),
            speech_region: DEFAULT_SPEECH_REGION.to_string(),
            speech_private_endpoint: None,
            use_private_endpoint: false,
            tts_voice: DEFAULT_TTS_VOICE.to_string(),
            stt_locales: parse_locales(DEFAULT_STT_LOCALES),
            avatar_character: DEFAULT_AVATAR_CHARACTER.to_string(),
            avatar_style: DEFAULT_AVATAR_STYLE.to_string(),
            avatar_background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            chat_endpoint: String::new(),
            chat_key: String::new(),
            chat_deployment: String::new(),
            chat_api_version: DEFAULT_CHAT_API_VERSION.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            stream_responses: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            search_endpoint: None,
            search_key: None,
            search_index: None,
            enable_search: true,
        }
    }
}

// Keys never appear in debug output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("speech_key", &mask_secret(&self.speech_key))
            .field("speech_region", &self.speech_region)
            .field("speech_private_endpoint", &self.speech_private_endpoint)
            .field("use_private_endpoint", &self.use_private_endpoint)
            .field("tts_voice", &self.tts_voice)
            .field("stt_locales", &self.stt_locales)
            .field("avatar_character", &self.avatar_character)
            .field("avatar_style", &self.avatar_style)
            .field("chat_endpoint", &self.chat_endpoint)
            .field("chat_key", &mask_secret(&self.chat_key))
            .field("chat_deployment", &self.chat_deployment)
            .field("chat_api_version", &self.chat_api_version)
            .field("stream_responses", &self.stream_responses)
            .field("search_endpoint", &self.search_endpoint)
            .field(
                "search_key",
                &self.search_key.as_deref().map(mask_secret),
            )
            .field("search_index", &self.search_index)
            .field("enable_search", &self.enable_search)
            .finish_non_exhaustive()
    }
}

/// Explicit overrides supplied by the UI. `Some` always wins over the
/// loaded value; for optional settings `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverrides {
    pub speech_region: Option<String>,
    pub speech_private_endpoint: Option<Option<String>>,
    pub use_private_endpoint: Option<bool>,
    pub tts_voice: Option<String>,
    pub stt_locales: Option<Vec<String>>,
    pub avatar_character: Option<String>,
    pub avatar_style: Option<String>,
    pub avatar_background_color: Option<String>,
    pub chat_deployment: Option<String>,
    pub chat_api_version: Option<String>,
    pub system_prompt: Option<String>,
    pub stream_responses: Option<bool>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub enable_search: Option<bool>,
}

impl SettingsOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Settings {
    /// Load from the process environment and apply overrides.
    pub fn load(overrides: &SettingsOverrides) -> Self {
        Self::load_with(|key| std::env::var(key).ok(), overrides)
    }

    /// Load through an arbitrary lookup and apply overrides.
    pub fn load_with<F>(lookup: F, overrides: &SettingsOverrides) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::from_lookup(lookup);
        settings.merge(overrides);
        settings
    }

    /// Build settings from a key/value lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            speech_key: get("AZURE_SPEECH_KEY").unwrap_or_default(),
            speech_region: get("AZURE_SPEECH_REGION").unwrap_or(defaults.speech_region),
            speech_private_endpoint: get("AZURE_SPEECH_PRIVATE_ENDPOINT"),
            use_private_endpoint: get("USE_PRIVATE_ENDPOINT").is_some_and(|value| parse_flag(&value)),
            tts_voice: get("TTS_VOICE").unwrap_or(defaults.tts_voice),
            stt_locales: get("STT_LOCALES")
                .map(|value| parse_locales(&value))
                .filter(|locales| !locales.is_empty())
                .unwrap_or(defaults.stt_locales),
            avatar_character: get("AVATAR_CHARACTER").unwrap_or(defaults.avatar_character),
            avatar_style: get("AVATAR_STYLE").unwrap_or(defaults.avatar_style),
            avatar_background_color: get("AVATAR_BACKGROUND_COLOR")
                .unwrap_or(defaults.avatar_background_color),
            chat_endpoint: get("AZURE_OPENAI_ENDPOINT").unwrap_or_default(),
            chat_key: get("AZURE_OPENAI_KEY").unwrap_or_default(),
            chat_deployment: get("AZURE_OPENAI_DEPLOYMENT").unwrap_or_default(),
            chat_api_version: get("AZURE_OPENAI_API_VERSION")
                .unwrap_or(defaults.chat_api_version),
            system_prompt: get("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            stream_responses: get("STREAM_RESPONSES").map_or(true, |value| parse_flag(&value)),
            max_tokens: parse_number(get("CHAT_MAX_TOKENS"), SettingsField::MaxTokens)
                .unwrap_or(defaults.max_tokens),
            temperature: parse_number(get("CHAT_TEMPERATURE"), SettingsField::Temperature)
                .unwrap_or(defaults.temperature),
            search_endpoint: get("AZURE_SEARCH_ENDPOINT"),
            search_key: get("AZURE_SEARCH_KEY"),
            search_index: get("AZURE_SEARCH_INDEX"),
            enable_search: get("ENABLE_AZURE_SEARCH").map_or(true, |value| parse_flag(&value)),
        }
    }

    /// Apply overrides in place. Only fields that are `Some` change.
    pub fn merge(&mut self, other: &SettingsOverrides) {
        if let Some(ref region) = other.speech_region {
            self.speech_region.clone_from(region);
        }
        if let Some(ref endpoint) = other.speech_private_endpoint {
            self.speech_private_endpoint.clone_from(endpoint);
        }
        if let Some(flag) = other.use_private_endpoint {
            self.use_private_endpoint = flag;
        }
        if let Some(ref voice) = other.tts_voice {
            self.tts_voice.clone_from(voice);
        }
        if let Some(ref locales) = other.stt_locales {
            self.stt_locales.clone_from(locales);
        }
        if let Some(ref character) = other.avatar_character {
            self.avatar_character.clone_from(character);
        }
        if let Some(ref style) = other.avatar_style {
            self.avatar_style.clone_from(style);
        }
        if let Some(ref color) = other.avatar_background_color {
            self.avatar_background_color.clone_from(color);
        }
        if let Some(ref deployment) = other.chat_deployment {
            self.chat_deployment.clone_from(deployment);
        }
        if let Some(ref version) = other.chat_api_version {
            self.chat_api_version.clone_from(version);
        }
        if let Some(ref prompt) = other.system_prompt {
            self.system_prompt.clone_from(prompt);
        }
        if let Some(stream) = other.stream_responses {
            self.stream_responses = stream;
        }
        if let Some(max_tokens) = other.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = other.temperature {
            self.temperature = temperature;
        }
        if let Some(enable) = other.enable_search {
            self.enable_search = enable;
        }
    }

    /// Check that a session may be opened with these settings.
    ///
    /// Missing retrieval fields never fail validation; retrieval is simply
    /// disabled unless all three are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        require(&mut issues, SettingsField::SpeechKey, &self.speech_key);
        require(&mut issues, SettingsField::SpeechRegion, &self.speech_region);
        if self.use_private_endpoint {
            match self.speech_private_endpoint.as_deref() {
                None => issues.push(FieldIssue::Missing(SettingsField::SpeechPrivateEndpoint)),
                Some(endpoint) => {
                    check_http_url(&mut issues, SettingsField::SpeechPrivateEndpoint, endpoint);
                }
            }
        }

        if require(&mut issues, SettingsField::ChatEndpoint, &self.chat_endpoint) {
            check_http_url(&mut issues, SettingsField::ChatEndpoint, &self.chat_endpoint);
        }
        require(&mut issues, SettingsField::ChatKey, &self.chat_key);
        require(&mut issues, SettingsField::ChatDeployment, &self.chat_deployment);
        require(&mut issues, SettingsField::ChatApiVersion, &self.chat_api_version);
        require(&mut issues, SettingsField::TtsVoice, &self.tts_voice);

        if let Some(retrieval) = self.retrieval() {
            check_http_url(&mut issues, SettingsField::SearchEndpoint, &retrieval.endpoint);
        }

        if self.max_tokens == 0 {
            issues.push(FieldIssue::Invalid {
                field: SettingsField::MaxTokens,
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(FieldIssue::Invalid {
                field: SettingsField::Temperature,
                reason: format!("must be between 0 and 2, got {}", self.temperature),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { issues })
        }
    }

    /// Retrieval configuration, present only when enabled and complete.
    pub fn retrieval(&self) -> Option<RetrievalSettings> {
        if !self.enable_search {
            return None;
        }
        match (
            self.search_endpoint.as_ref(),
            self.search_key.as_ref(),
            self.search_index.as_ref(),
        ) {
            (Some(endpoint), Some(key), Some(index)) => Some(RetrievalSettings {
                endpoint: endpoint.clone(),
                key: key.clone(),
                index: index.clone(),
            }),
            _ => None,
        }
    }

    /// The subset of settings the speech/avatar backend needs.
    pub fn speech(&self) -> SpeechSettings {
        SpeechSettings {
            region: self.speech_region.clone(),
            key: self.speech_key.clone(),
            private_endpoint: self
                .speech_private_endpoint
                .as_ref()
                .filter(|_| self.use_private_endpoint)
                .map(|endpoint| endpoint.trim_end_matches('/').to_string()),
            character: self.avatar_character.clone(),
            style: self.avatar_style.clone(),
            background_color: self.avatar_background_color.clone(),
            voice: self.tts_voice.clone(),
            locales: self.stt_locales.clone(),
        }
    }

    /// The subset of settings the chat backend needs.
    pub fn chat(&self) -> ChatSettings {
        ChatSettings {
            endpoint: self.chat_endpoint.trim_end_matches('/').to_string(),
            key: self.chat_key.clone(),
            deployment: self.chat_deployment.clone(),
            api_version: self.chat_api_version.clone(),
            system_prompt: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            retrieval: self.retrieval(),
        }
    }

    /// Non-fatal warnings about unusual values.
    pub fn advisories(&self) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        if !COMMON_SPEECH_REGIONS.contains(&self.speech_region.as_str()) {
            advisories.push(Advisory {
                field: SettingsField::SpeechRegion,
                message: format!(
                    "region '{}' is not in the common regions list ({}, ...)",
                    self.speech_region,
                    COMMON_SPEECH_REGIONS[..5].join(", ")
                ),
            });
        }

        if !self.chat_endpoint.is_empty()
            && !(self.chat_endpoint.starts_with("https://")
                && self.chat_endpoint.contains(".openai.azure.com"))
        {
            advisories.push(Advisory {
                field: SettingsField::ChatEndpoint,
                message: "unusual format (expected https://<name>.openai.azure.com)".to_string(),
            });
        }

        if !STANDARD_AVATAR_CHARACTERS.contains(&self.avatar_character.as_str()) {
            advisories.push(Advisory {
                field: SettingsField::AvatarCharacter,
                message: format!(
                    "character '{}' is not a standard avatar ({})",
                    self.avatar_character,
                    STANDARD_AVATAR_CHARACTERS.join(", ")
                ),
            });
        }

        let search_fields = [
            (SettingsField::SearchEndpoint, &self.search_endpoint),
            (SettingsField::SearchKey, &self.search_key),
            (SettingsField::SearchIndex, &self.search_index),
        ];
        let present = search_fields.iter().filter(|(_, v)| v.is_some()).count();
        if self.enable_search && present > 0 && present < search_fields.len() {
            let missing: Vec<&str> = search_fields
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(field, _)| field.env_var())
                .collect();
            advisories.push(Advisory {
                field: SettingsField::SearchEndpoint,
                message: format!(
                    "retrieval partially configured, disabled until {} set",
                    missing.join(", ")
                ),
            });
        }

        advisories
    }

    /// Display-safe summary. Secrets are masked.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Speech Region", self.speech_region.clone()),
            ("Speech Key", mask_secret(&self.speech_key)),
            ("Private Endpoint", self.use_private_endpoint.to_string()),
            ("Avatar Character", self.avatar_character.clone()),
            ("Avatar Style", self.avatar_style.clone()),
            ("TTS Voice", self.tts_voice.clone()),
            ("STT Locales", self.stt_locales.join(", ")),
            ("OpenAI Endpoint", self.chat_endpoint.clone()),
            ("OpenAI Key", mask_secret(&self.chat_key)),
            ("OpenAI Deployment", self.chat_deployment.clone()),
            ("API Version", self.chat_api_version.clone()),
            ("Streaming", self.stream_responses.to_string()),
            ("Search Enabled", self.retrieval().is_some().to_string()),
            (
                "Search Index",
                self.search_index.clone().unwrap_or_else(|| "-".to_string()),
            ),
        ]
    }
}

/// Settings for the speech/avatar backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSettings {
    pub region: String,
    pub key: String,
    /// Set only when the private endpoint is enabled.
    pub private_endpoint: Option<String>,
    pub character: String,
    pub style: String,
    pub background_color: String,
    pub voice: String,
    pub locales: Vec<String>,
}

impl SpeechSettings {
    /// Base REST endpoint (cognitive services host or private endpoint).
    pub fn endpoint(&self) -> String {
        self.private_endpoint.clone().unwrap_or_else(|| {
            format!("https://{}.api.cognitive.microsoft.com", self.region)
        })
    }

    pub fn token_url(&self) -> String {
        format!("{}/sts/v1.0/issueToken", self.endpoint())
    }

    pub fn tts_url(&self) -> String {
        match self.private_endpoint {
            Some(ref endpoint) => format!("{endpoint}/tts/cognitiveservices/v1"),
            None => format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            ),
        }
    }

    pub fn avatar_relay_token_url(&self) -> String {
        match self.private_endpoint {
            Some(ref endpoint) => {
                format!("{endpoint}/tts/cognitiveservices/avatar/relay/token/v1")
            }
            None => format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/avatar/relay/token/v1",
                self.region
            ),
        }
    }
}

impl fmt::Debug for SpeechSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechSettings")
            .field("region", &self.region)
            .field("key", &mask_secret(&self.key))
            .field("private_endpoint", &self.private_endpoint)
            .field("character", &self.character)
            .field("style", &self.style)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

/// Settings for the chat completion backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Endpoint without trailing slash.
    pub endpoint: String,
    pub key: String,
    pub deployment: String,
    pub api_version: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retrieval: Option<RetrievalSettings>,
}

impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("endpoint", &self.endpoint)
            .field("key", &mask_secret(&self.key))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

/// Document-search backend used to ground chat responses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub endpoint: String,
    pub key: String,
    pub index: String,
}

impl fmt::Debug for RetrievalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalSettings")
            .field("endpoint", &self.endpoint)
            .field("key", &mask_secret(&self.key))
            .field("index", &self.index)
            .finish()
    }
}

/// Mask all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return "(not set)".to_string();
    }
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_locales(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|locale| !locale.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, field: SettingsField) -> Option<T> {
    let raw = value?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(
                field = field.env_var(),
                value = %raw,
                "Ignoring unparseable setting, using default"
            );
            None
        }
    }
}

/// Push a `Missing` issue when blank. Returns whether the value is present.
fn require(issues: &mut Vec<FieldIssue>, field: SettingsField, value: &str) -> bool {
    if value.trim().is_empty() {
        issues.push(FieldIssue::Missing(field));
        false
    } else {
        true
    }
}

fn check_http_url(issues: &mut Vec<FieldIssue>, field: SettingsField, value: &str) {
    let reason = match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => return,
        Ok(url) => format!("unsupported URL '{value}' (scheme {})", url.scheme()),
        Err(e) => format!("'{value}' is not an absolute URL: {e}"),
    };
    issues.push(FieldIssue::Invalid { field, reason });
}
