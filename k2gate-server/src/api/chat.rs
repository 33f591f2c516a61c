//! `/v1/chat/completions` and `/v1/models`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use k2gate_core::constants::{
    CHAT_COMPLETION_OBJECT, MODEL_ID, MODEL_ID_NOTHINK, MODEL_OWNER, MODEL_ROOT,
};
use k2gate_core::tools::{self, ToolChoicePolicy};
use k2gate_core::translate::stream::{completion_stream, StreamPacing};
use k2gate_core::translate::{translate_full, TranslatedMessage};
use k2gate_types::protocol::{ChatCompletionRequest, ChatMessage, ToolCall, Usage};
use k2gate_types::GatewayError;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{verify_api_key, ApiError};
use crate::state::AppState;

/// Reasoning deltas are emitted unless the client picked the
/// "-nothink" variant.
fn shows_reasoning(model: &str) -> bool {
    model != MODEL_ID_NOTHINK
}

/// Maps the nothink alias back to the real upstream model id.
fn upstream_model_id(model: &str) -> &str {
    if model == MODEL_ID_NOTHINK {
        MODEL_ID
    } else {
        model
    }
}

pub async fn list_models() -> Json<Value> {
    let created = chrono::Utc::now().timestamp();
    let entry = |id: &str| {
        json!({
            "id": id,
            "object": "model",
            "created": created,
            "owned_by": MODEL_OWNER,
            "root": MODEL_ROOT,
        })
    };
    Json(json!({
        "object": "list",
        "data": [entry(MODEL_ID), entry(MODEL_ID_NOTHINK)],
    }))
}

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    verify_api_key(&headers, &state.config.valid_api_key)?;

    if request.messages.is_empty() {
        return Err(GatewayError::InvalidRequest {
            message: "messages must not be empty".to_string(),
        }
        .into());
    }

    let policy = ToolChoicePolicy::parse(request.tool_choice.as_ref(), request.has_tools())?;
    let declared_tools = request.tools.clone().unwrap_or_default();

    // tools ride in as a synthetic system message ahead of the
    // conversation
    let mut messages = request.messages.clone();
    if !declared_tools.is_empty() && policy != ToolChoicePolicy::None {
        messages.insert(
            0,
            ChatMessage::new("system", tools::tool_system_prompt(&declared_tools)),
        );
    }

    info!(
        "📥 Chat request: model={}, messages={}, stream={}, tools={}",
        request.model,
        messages.len(),
        request.stream,
        declared_tools.len()
    );

    let completion = state
        .dispatcher
        .dispatch(&messages, upstream_model_id(&request.model))
        .await?;

    let show_reasoning = shows_reasoning(&request.model);
    let translated = translate_full(&completion.content, show_reasoning);

    let tool_calls = tools::extract_tool_calls(&translated.answer, &declared_tools, &policy)?;

    if request.stream {
        Ok(stream_response(&state, request.model, translated, tool_calls, completion.usage))
    } else {
        Ok(json_response(request.model, translated, tool_calls, completion.usage))
    }
}

fn stream_response(
    state: &AppState,
    model: String,
    translated: TranslatedMessage,
    tool_calls: Option<Vec<ToolCall>>,
    usage: Usage,
) -> Response {
    let pacing = StreamPacing {
        delay: state.config.stream_delay,
        base_chunk_size: state.config.stream_chunk_size,
        max_stream_time: state.config.max_stream_time,
    };
    let stream = completion_stream(translated, tool_calls, model, usage, pacing);

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

fn json_response(
    model: String,
    translated: TranslatedMessage,
    tool_calls: Option<Vec<ToolCall>>,
    usage: Usage,
) -> Response {
    let finish_reason = if tool_calls.is_some() { "tool_calls" } else { "stop" };

    let mut message = json!({
        "role": "assistant",
        "content": if tool_calls.is_some() { Value::Null } else { Value::String(translated.answer) },
    });
    if !translated.reasoning.is_empty() {
        message["reasoning_content"] = Value::String(translated.reasoning);
    }
    if let Some(calls) = tool_calls {
        message["tool_calls"] = json!(calls);
    }

    Json(json!({
        "id": format!("chatcmpl-{}", Uuid::new_v4()),
        "object": CHAT_COMPLETION_OBJECT,
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": usage,
    }))
    .into_response()
}
