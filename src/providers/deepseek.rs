//! DeepSeek chat provider (OpenAI-compatible API)
//!
//! Streams completions from `POST {base}/chat/completions` with SSE framing
//! and normalizes the deltas into the line-delimited event protocol.
//! Reasoner models deliver reasoning through `delta.reasoning_content`;
//! those deltas are accumulated and re-emitted as the full thinking text so
//! far wrapped in `<think>...</think>`, keeping replace semantics lossless.

use crate::config::DeepseekSettings;
use crate::errors::{AppError, Result};
use crate::providers::{ChatProvider, FrameStream};
use crate::relay::decoder::StreamDecoder;
use crate::relay::{done_frame, frame, DATA_PREFIX, DONE_SENTINEL, THINK_CLOSE, THINK_OPEN};
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// DeepSeek streaming client
#[derive(Debug, Clone)]
pub struct DeepseekProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepseekProvider {
    pub fn new(settings: &DeepseekSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    async fn open_completion(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionCall {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
impl ChatProvider for DeepseekProvider {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_complete(&self, messages: &[ChatMessage]) -> Result<FrameStream> {
        let response = self.open_completion(messages, true).await?;

        let stream = async_stream::try_stream! {
            let mut decoder = StreamDecoder::new();
            let mut reasoning = String::new();
            let mut bytes = response.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|err| AppError::StreamRead(err.to_string()))?;
                for line in decoder.push(&chunk) {
                    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                        continue;
                    };
                    if payload == DONE_SENTINEL {
                        yield done_frame();
                        return;
                    }
                    let parsed: CompletionChunk = match serde_json::from_str(payload) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            warn!(error = %err, "skipping undecodable provider chunk");
                            continue;
                        }
                    };
                    let Some(delta) = parsed.choices.into_iter().next().map(|c| c.delta) else {
                        continue;
                    };
                    if let Some(fragment) = delta.reasoning_content.filter(|f| !f.is_empty()) {
                        reasoning.push_str(&fragment);
                        yield frame(&format!("{THINK_OPEN}{reasoning}{THINK_CLOSE}"));
                    }
                    if let Some(fragment) = delta.content.filter(|f| !f.is_empty()) {
                        yield frame(&fragment);
                    }
                }
            }
            yield done_frame();
        };

        Ok(Box::pin(stream))
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.open_completion(messages, false).await?;
        let body: CompletionResponse = response.json().await?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Outbound completion call body
#[derive(Debug, Clone, Serialize)]
struct CompletionCall {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// One SSE chunk of a streamed completion
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Non-streaming completion response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
