//! Ollama chat provider
//!
//! Streams completions from a local Ollama server (`POST /api/chat`) and
//! normalizes its chunked JSON into the line-delimited event protocol.
//! Reasoning models of the deepseek-r1 family embed `<think>...</think>`
//! markers in their content stream; those sections are re-emitted as the
//! full thinking text so far, so downstream replace semantics lose nothing.

use crate::config::OllamaSettings;
use crate::errors::{AppError, Result};
use crate::providers::json_stream::JsonObjectStream;
use crate::providers::{ChatProvider, FrameStream};
use crate::relay::{done_frame, frame, THINK_CLOSE, THINK_OPEN};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

/// Connect timeout for the upstream socket
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sampling temperature; r1-family models want 0.6–0.8
const TEMPERATURE: f64 = 0.7;

/// Ollama streaming client
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(settings: &OllamaSettings, model: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn open_chat(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatCall {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream,
            keep_alive: -1,
            options: json!({ "temperature": TEMPERATURE }),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamHttp {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_complete(&self, messages: &[ChatMessage]) -> Result<FrameStream> {
        let response = self.open_chat(messages, true).await?;

        let stream = async_stream::try_stream! {
            let mut objects = JsonObjectStream::new();
            let mut think = ThinkNormalizer::new();
            let mut bytes = response.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|err| AppError::StreamRead(err.to_string()))?;
                for object in objects.push(&chunk)? {
                    let parsed: ChatChunk = match serde_json::from_str(&object) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            warn!(error = %err, "skipping undecodable provider chunk");
                            continue;
                        }
                    };
                    if let Some(message) = parsed.message {
                        if !message.content.is_empty() {
                            for payload in think.push(&message.content) {
                                yield frame(&payload);
                            }
                        }
                    }
                    if parsed.done {
                        yield done_frame();
                        return;
                    }
                }
            }
            yield done_frame();
        };

        Ok(Box::pin(stream))
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.open_chat(messages, false).await?;
        let body: ChatChunk = response.json().await?;
        Ok(body.message.map(|m| m.content).unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Outbound chat call body
#[derive(Debug, Clone, Serialize)]
struct ChatCall {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    keep_alive: i64,
    options: serde_json::Value,
}

/// One streamed chunk of `/api/chat` output
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Converts marker-delimited content deltas into normalized payloads
///
/// Outside a think section, deltas pass through as response payloads.
/// Inside one, each delta re-emits the accumulated thinking wrapped in
/// markers, making every think payload a complete replacement value.
#[derive(Debug, Default)]
struct ThinkNormalizer {
    in_think: bool,
    think: String,
}

impl ThinkNormalizer {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, fragment: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut rest = fragment;

        while !rest.is_empty() {
            if self.in_think {
                match rest.find(THINK_CLOSE) {
                    Some(idx) => {
                        self.think.push_str(&rest[..idx]);
                        self.in_think = false;
                        out.push(format!("{THINK_OPEN}{}{THINK_CLOSE}", self.think));
                        rest = &rest[idx + THINK_CLOSE.len()..];
                    }
                    None => {
                        self.think.push_str(rest);
                        out.push(format!("{THINK_OPEN}{}{THINK_CLOSE}", self.think));
                        rest = "";
                    }
                }
            } else {
                match rest.find(THINK_OPEN) {
                    Some(idx) => {
                        if idx > 0 {
                            out.push(rest[..idx].to_string());
                        }
                        self.in_think = true;
                        rest = &rest[idx + THINK_OPEN.len()..];
                    }
                    None => {
                        out.push(rest.to_string());
                        rest = "";
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let settings = OllamaSettings {
            base_url: "http://127.0.0.1:11434/".to_string(),
            chat_model: "deepseek-r1:32b".to_string(),
            reason_model: "deepseek-r1:32b".to_string(),
        };
        let provider = OllamaProvider::new(&settings, &settings.chat_model).unwrap();
        assert_eq!(provider.model(), "deepseek-r1:32b");
        assert_eq!(provider.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_plain_fragments_pass_through() {
        let mut normalizer = ThinkNormalizer::new();
        assert_eq!(normalizer.push("hello"), vec!["hello"]);
        assert_eq!(normalizer.push(" world"), vec![" world"]);
    }

    #[test]
    fn test_think_section_reemits_full_text() {
        let mut normalizer = ThinkNormalizer::new();
        assert_eq!(
            normalizer.push("<think>step one"),
            vec!["<think>step one</think>"]
        );
        assert_eq!(
            normalizer.push(", step two"),
            vec!["<think>step one, step two</think>"]
        );
        assert_eq!(
            normalizer.push(" done</think>The answer"),
            vec![
                "<think>step one, step two done</think>".to_string(),
                "The answer".to_string()
            ]
        );
        assert_eq!(normalizer.push(" is 42"), vec![" is 42"]);
    }

    #[test]
    fn test_whole_think_block_in_one_fragment() {
        let mut normalizer = ThinkNormalizer::new();
        assert_eq!(
            normalizer.push("before<think>reason</think>after"),
            vec![
                "before".to_string(),
                "<think>reason</think>".to_string(),
                "after".to_string()
            ]
        );
    }

    #[test]
    fn test_chat_chunk_parsing() {
        let parsed: ChatChunk =
            serde_json::from_str(r#"{"message":{"content":"hi"},"done":false}"#).unwrap();
        assert_eq!(parsed.message.unwrap().content, "hi");
        assert!(!parsed.done);

        let done: ChatChunk = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(done.done);
    }
}
