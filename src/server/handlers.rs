//! Streaming endpoint handlers
//!
//! Each handler opens one upstream provider stream and relays it to the
//! client as a chunked `text/event-stream` response. Failures before any
//! bytes are sent surface as HTTP error statuses; failures mid-stream end
//! the response with an inline error frame.

use crate::auth::AuthClaims;
use crate::errors::{AppError, Result};
use crate::providers::FrameStream;
use crate::relay;
use crate::search::SearchService;
use crate::server::AppState;
use crate::types::ChatRequest;
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub async fn chat(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    info!(
        message_count = request.messages.len(),
        provider = state.providers.chat.name(),
        "chat request"
    );
    let upstream = state.providers.chat.stream_complete(&request.messages).await?;
    Ok(stream_response(upstream, state.settings.stream_idle_timeout))
}

pub async fn reason(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    info!(
        message_count = request.messages.len(),
        provider = state.providers.reason.name(),
        "reason request"
    );
    let upstream = state
        .providers
        .reason
        .stream_complete(&request.messages)
        .await?;
    Ok(stream_response(upstream, state.settings.stream_idle_timeout))
}

pub async fn search(
    State(state): State<AppState>,
    _claims: AuthClaims,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    let question = request
        .messages
        .first()
        .map(|message| message.content.clone())
        .ok_or_else(|| AppError::Config("search request carries no messages".to_string()))?;

    info!(provider = state.providers.chat.name(), "search request");
    let service = SearchService::new(
        state.providers.chat.clone(),
        state.settings.serpapi_key.clone(),
        state.settings.search_result_count,
    );
    let upstream = service.stream(&question).await?;
    Ok(stream_response(upstream, state.settings.stream_idle_timeout))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Wrap an upstream frame stream in a chunked SSE-framed response
fn stream_response(upstream: FrameStream, idle_timeout: Duration) -> Response {
    let body = Body::from_stream(relay::forward(upstream, idle_timeout));
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        body,
    )
        .into_response()
}
