//! Model provider clients
//!
//! Each provider opens a single outbound streaming HTTP POST per request
//! and exposes a normalized frame stream (`data: <payload>\n\n` lines ending
//! with the `[DONE]` sentinel). Which provider backs which endpoint is a
//! pure configuration switch; there is no fallback logic and no retry at
//! this layer.

pub mod deepseek;
pub mod json_stream;
pub mod ollama;

pub use deepseek::DeepseekProvider;
pub use ollama::OllamaProvider;

use crate::config::{ServiceKind, Settings};
use crate::errors::Result;
use crate::types::ChatMessage;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Normalized frame stream returned by a provider
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A chat completion backend
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider identifier for logs
    fn name(&self) -> &'static str;

    /// Model this provider instance is bound to
    fn model(&self) -> &str;

    /// Open a streaming completion for an ordered conversation
    ///
    /// Fails with `UpstreamUnavailable` when the connection cannot be
    /// established and `UpstreamHttp` when the initial status is not 2xx.
    async fn stream_complete(&self, messages: &[ChatMessage]) -> Result<FrameStream>;

    /// Run a completion to the end and return the full answer text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Whether the backend currently answers at all
    async fn health_check(&self) -> bool;
}

/// Which endpoint family a provider instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointRole {
    Chat,
    Reason,
}

/// Providers selected by configuration, one per endpoint family
///
/// `chat` backs the chat and search endpoints, `reason` backs the reasoning
/// endpoint.
#[derive(Clone)]
pub struct ProviderRegistry {
    pub chat: Arc<dyn ChatProvider>,
    pub reason: Arc<dyn ChatProvider>,
}

impl ProviderRegistry {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            chat: build(settings, settings.chat_service, EndpointRole::Chat)?,
            reason: build(settings, settings.reason_service, EndpointRole::Reason)?,
        })
    }
}

fn build(
    settings: &Settings,
    kind: ServiceKind,
    role: EndpointRole,
) -> Result<Arc<dyn ChatProvider>> {
    let provider: Arc<dyn ChatProvider> = match kind {
        ServiceKind::Deepseek => Arc::new(DeepseekProvider::new(&settings.deepseek)?),
        ServiceKind::Ollama => {
            let model = match role {
                EndpointRole::Chat => &settings.ollama.chat_model,
                EndpointRole::Reason => &settings.ollama.reason_model,
            };
            Arc::new(OllamaProvider::new(&settings.ollama, model)?)
        }
    };
    Ok(provider)
}
