//! Simulated SSE streaming.
//!
//! The upstream is fetched non-streaming, then the translated content
//! is re-chunked into OpenAI `chat.completion.chunk` events with a
//! small delay between them. The chunk size adapts to the content
//! length so total streaming time stays under `MAX_STREAM_TIME`.

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use k2gate_types::protocol::{ToolCall, Usage};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::TranslatedMessage;
use crate::constants::{CHAT_COMPLETION_CHUNK_OBJECT, MIN_CHUNK_SIZE, STREAM_DONE_MARKER};

/// Pacing knobs for the simulated stream, lifted out of the full
/// config so the stream generator stays testable.
#[derive(Debug, Clone, Copy)]
pub struct StreamPacing {
    pub delay: Duration,
    pub base_chunk_size: usize,
    pub max_stream_time: Duration,
}

/// Picks a chunk size so `content_len / chunk_size * delay` stays
/// under the maximum streaming time, floored at [`MIN_CHUNK_SIZE`].
/// Short content falls back to the configured base size.
pub fn dynamic_chunk_size(content_len: usize, pacing: &StreamPacing) -> usize {
    if content_len == 0 {
        return pacing.base_chunk_size.max(1);
    }
    let calculated = (content_len as f64 * pacing.delay.as_secs_f64()
        / pacing.max_stream_time.as_secs_f64()) as usize;
    let mut size = calculated.max(MIN_CHUNK_SIZE);
    if size > content_len {
        size = pacing.base_chunk_size.min(content_len);
    }
    debug!("Dynamic chunk size: content={content_len}, calculated={calculated}, final={size}");
    size.max(1)
}

/// Splits on char boundaries, `size` characters per chunk.
pub fn char_chunks(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for (count, ch) in text.chars().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn sse_event(id: &str, created: i64, model: &str, delta: Value, finish_reason: Option<&str>) -> Bytes {
    let chunk = json!({
        "id": id,
        "object": CHAT_COMPLETION_CHUNK_OBJECT,
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason,
        }],
    });
    Bytes::from(format!("data: {chunk}\n\n"))
}

/// Builds the full simulated SSE stream for one completion.
///
/// Order: role-priming chunk, reasoning deltas (when present), content
/// deltas, an optional tool-call delta, the finish chunk, `[DONE]`.
pub fn completion_stream(
    message: TranslatedMessage,
    tool_calls: Option<Vec<ToolCall>>,
    model: String,
    usage: Usage,
    pacing: StreamPacing,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let id = format!("chatcmpl-{}", Uuid::new_v4());
        let created = chrono::Utc::now().timestamp();

        yield Ok(sse_event(
            &id,
            created,
            &model,
            json!({"role": "assistant", "content": ""}),
            None,
        ));

        if !message.reasoning.is_empty() {
            let size = dynamic_chunk_size(message.reasoning.chars().count(), &pacing);
            for piece in char_chunks(&message.reasoning, size) {
                yield Ok(sse_event(&id, created, &model, json!({"reasoning_content": piece}), None));
                tokio::time::sleep(pacing.delay).await;
            }
        }

        let finish_reason = if tool_calls.is_some() { "tool_calls" } else { "stop" };

        if tool_calls.is_none() && !message.answer.is_empty() {
            let size = dynamic_chunk_size(message.answer.chars().count(), &pacing);
            for piece in char_chunks(&message.answer, size) {
                yield Ok(sse_event(&id, created, &model, json!({"content": piece}), None));
                tokio::time::sleep(pacing.delay).await;
            }
        }

        if let Some(calls) = tool_calls {
            let deltas: Vec<Value> = calls
                .iter()
                .enumerate()
                .map(|(index, call)| {
                    json!({
                        "index": index,
                        "id": call.id,
                        "type": call.call_type,
                        "function": {
                            "name": call.function.name,
                            "arguments": call.function.arguments,
                        },
                    })
                })
                .collect();
            yield Ok(sse_event(&id, created, &model, json!({"tool_calls": deltas}), None));
        }

        let final_chunk = json!({
            "id": id,
            "object": CHAT_COMPLETION_CHUNK_OBJECT,
            "created": created,
            "model": model,
            "choices": [{
                "index": 0,
                "delta": {},
                "finish_reason": finish_reason,
            }],
            "usage": usage,
        });
        yield Ok(Bytes::from(format!("data: {final_chunk}\n\n")));
        yield Ok(Bytes::from(STREAM_DONE_MARKER));
    }
}
