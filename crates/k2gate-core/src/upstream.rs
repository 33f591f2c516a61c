//! K2-Think upstream request construction.

use chrono::Utc;
use chrono_tz::Asia::Shanghai;
use k2gate_types::protocol::ChatMessage;
use k2gate_types::GatewayError;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::constants::{DEFAULT_USER_AGENT, MODEL_ID, MODEL_OWNER, MODEL_ROOT};

/// Builds the shared HTTP client, honoring the optional proxy. One
/// client is reused for every upstream call.
pub fn build_client(config: &GatewayConfig) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(std::time::Duration::from_secs(10))
        .pool_max_idle_per_host(20);

    if let Some(proxy_url) = &config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| GatewayError::Internal {
            message: format!("invalid PROXY_URL '{proxy_url}': {e}"),
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| GatewayError::Internal {
        message: format!("cannot build HTTP client: {e}"),
    })
}

/// One prepared upstream request: body plus the per-request ids the
/// headers need.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub payload: Value,
    pub chat_id: String,
}

/// The `variables` block the upstream web UI normally substitutes.
fn datetime_variables() -> Value {
    let now = Utc::now().with_timezone(&Shanghai);
    json!({
        "{{USER_NAME}}": "User",
        "{{USER_LOCATION}}": "Unknown",
        "{{CURRENT_DATETIME}}": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "{{CURRENT_DATE}}": now.format("%Y-%m-%d").to_string(),
        "{{CURRENT_TIME}}": now.format("%H:%M:%S").to_string(),
        "{{CURRENT_WEEKDAY}}": now.format("%A").to_string(),
        "{{CURRENT_TIMEZONE}}": "Asia/Shanghai",
        "{{USER_LANGUAGE}}": "en-US",
    })
}

/// Builds the K2-Think chat payload. The upstream speaks the web-UI
/// dialect, so the body carries chat/session ids and UI feature flags
/// alongside the messages. `stream` is always false: streaming is
/// simulated on our side.
pub fn build_payload(messages: &[ChatMessage], model_id: &str) -> UpstreamRequest {
    let chat_id = Uuid::new_v4().to_string();
    let model_id = if model_id.is_empty() { MODEL_ID } else { model_id };

    let upstream_messages: Vec<Value> = messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content_text()}))
        .collect();

    let payload = json!({
        "stream": false,
        "model": model_id,
        "messages": upstream_messages,
        "params": {},
        "tool_servers": [],
        "features": {
            "image_generation": false,
            "code_interpreter": false,
            "web_search": false,
        },
        "variables": datetime_variables(),
        "model_item": {
            "id": model_id,
            "object": "model",
            "owned_by": MODEL_OWNER,
            "root": MODEL_ROOT,
            "parent": null,
            "status": "active",
            "connection_type": "external",
            "name": model_id,
        },
        "background_tasks": {
            "title_generation": true,
            "tags_generation": true,
        },
        "chat_id": chat_id,
        "id": Uuid::new_v4().to_string(),
        "session_id": Uuid::new_v4().to_string(),
    });

    UpstreamRequest { payload, chat_id }
}

/// Browser-shaped headers the upstream expects on API calls.
pub fn request_headers(token: &str, chat_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("Accept", "application/json".to_string()),
        ("Content-Type", "application/json".to_string()),
        ("Authorization", format!("Bearer {token}")),
        ("Origin", "https://www.k2think.ai".to_string()),
        ("Referer", format!("https://www.k2think.ai/c/{chat_id}")),
        ("User-Agent", DEFAULT_USER_AGENT.to_string()),
    ]
}
