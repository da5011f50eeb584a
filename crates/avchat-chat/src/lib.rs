//! Azure OpenAI chat completion client.
//!
//! [`AzureChatClient`] implements the core `ChatCompletionPort`. Every request
//! replays the full history; when a retrieval backend is configured the
//! request is routed through the extensions endpoint with an Azure AI Search
//! data source attached. Streaming responses are decoded from server-sent
//! events into a cancellable fragment stream.

#![deny(unused_crate_dependencies)]

pub mod citations;
pub mod client;
pub mod error;
pub mod probe;
pub mod sse;
pub mod wire;

pub use citations::CitationFilter;
pub use client::AzureChatClient;
pub use error::{ChatClientError, ChatResult};
pub use probe::{SearchProbe, probe_chat, probe_search};

// Silence unused dev-dependency warnings for the lib test target
#[cfg(test)]
use mockito as _;
#[cfg(test)]
use tokio as _;

