use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CompletionSource, Message, ProviderError, TextStream};

/// Completion source backed by an OpenAI-compatible chat endpoint
/// (OpenRouter, OpenAI, or any local server speaking the same protocol).
///
/// One instance is bound to one model id; the engine holds two instances,
/// one for the generator and one for the auditor. The API key is supplied
/// per instance and never read from the environment.
pub struct OpenAiCompatSource {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatSource {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        messages: &[Message],
        temperature: f32,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature,
                stream,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionSource for OpenAiCompatSource {
    async fn stream_chat(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<TextStream, ProviderError> {
        debug!(model = %self.model, temperature, "starting streaming completion");

        let response = self.send(messages, temperature, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            let mut pending = String::new();

            'receive: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                pending.push_str(&String::from_utf8_lossy(&chunk));

                // Drain complete SSE lines; a partial line stays buffered
                // until the next network chunk completes it.
                while let Some(pos) = pending.find('\n') {
                    let line = pending[..pos].trim().to_string();
                    pending.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'receive;
                    }

                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(parsed) => {
                            for choice in parsed.choices {
                                if let Some(content) = choice.delta.content {
                                    if !content.is_empty() {
                                        yield content;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable stream chunk");
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        debug!(model = %self.model, temperature, "running single-shot completion");

        let messages = [Message::system(system_prompt), Message::user(user_prompt)];
        let response = self.send(&messages, temperature, false).await?;
        let body: ChatResponse = response.json().await?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiCompatSource::new("https://example.test/v1", "some-model", "  ");
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let source =
            OpenAiCompatSource::new("https://example.test/v1/", "some-model", "sk-key").unwrap();
        assert_eq!(source.endpoint(), "https://example.test/v1/chat/completions");
    }

    #[test]
    fn test_stream_chunk_parses_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"hello"}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_stream_chunk_tolerates_empty_delta() {
        let data = r#"{"choices":[{"delta":{}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }
}
