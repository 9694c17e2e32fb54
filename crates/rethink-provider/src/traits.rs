use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::Message;

/// Errors that can occur when talking to a completion provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API key is required (bring your own key)")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Response contained no completion choices")]
    EmptyResponse,
}

/// Lazy sequence of text deltas produced by a streaming completion call
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// The core abstraction over a language-model call
///
/// Two modes: `stream_chat` yields incremental text deltas as they arrive,
/// `complete` returns a single finished result. Dropping the stream cancels
/// the underlying call; no side effects remain beyond the deltas already
/// delivered.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Start a streaming chat completion over the given conversation.
    async fn stream_chat(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<TextStream, ProviderError>;

    /// Run a single-shot completion with a system and user prompt.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}
