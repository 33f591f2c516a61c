//! Upstream dispatch with token failover.

use std::sync::Arc;

use k2gate_types::protocol::{ChatMessage, Usage};
use k2gate_types::GatewayError;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::refresh::RefreshScheduler;
use crate::token_pool::TokenPool;
use crate::upstream;

/// Raw upstream completion, still carrying the `<think>`/`<answer>`
/// tags. Translation happens at the handler.
#[derive(Debug, Clone)]
pub struct UpstreamCompletion {
    pub content: String,
    pub usage: Usage,
}

/// Sends a chat request upstream, rotating through the pool on
/// failure. The retry bound equals the pool size so a small pool can
/// never loop forever.
#[derive(Clone)]
pub struct RequestDispatcher {
    client: reqwest::Client,
    pool: Arc<TokenPool>,
    scheduler: Option<RefreshScheduler>,
    config: GatewayConfig,
}

impl RequestDispatcher {
    pub fn new(
        client: reqwest::Client,
        pool: Arc<TokenPool>,
        scheduler: Option<RefreshScheduler>,
        config: GatewayConfig,
    ) -> Self {
        Self { client, pool, scheduler, config }
    }

    /// One full dispatch: select a token, call upstream, fail over to
    /// the next token on transport/auth errors, up to pool-size
    /// attempts.
    pub async fn dispatch(
        &self,
        messages: &[ChatMessage],
        upstream_model: &str,
    ) -> Result<UpstreamCompletion, GatewayError> {
        let attempts = self.pool.len().max(1);
        let mut last_error: Option<GatewayError> = None;

        for attempt in 1..=attempts {
            let token = self.pool.select()?;

            match self.try_once(&token, messages, upstream_model).await {
                Ok(completion) => {
                    self.pool.record_success(&token);
                    if attempt > 1 {
                        info!("Dispatch succeeded on attempt {attempt}/{attempts}");
                    }
                    return Ok(completion);
                }
                Err(e) if e.counts_against_token() => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    self.pool.record_failure(&token, &e.to_string());
                    if let Some(scheduler) = &self.scheduler {
                        scheduler.observe_failure();
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::PoolExhausted {
            reason: match last_error {
                Some(e) => format!("all {attempts} attempts failed, last error: {e}"),
                None => format!("all {attempts} attempts failed"),
            },
        })
    }

    async fn try_once(
        &self,
        token: &str,
        messages: &[ChatMessage],
        upstream_model: &str,
    ) -> Result<UpstreamCompletion, GatewayError> {
        let request = upstream::build_payload(messages, upstream_model);

        let mut builder = self.client.post(&self.config.upstream_url);
        for (name, value) in upstream::request_headers(token, &request.chat_id) {
            builder = builder.header(name, value);
        }

        let response = builder.json(&request.payload).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout { duration_secs: self.config.request_timeout.as_secs() }
            } else {
                GatewayError::UpstreamTransport { message: e.to_string() }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UpstreamAuth {
                message: format!("upstream returned {status}: {}", truncate(&body, 200)),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UpstreamTransport {
                message: format!("upstream returned {status}: {}", truncate(&body, 200)),
            });
        }

        let body: Value = response.json().await.map_err(|e| GatewayError::UpstreamTransport {
            message: format!("invalid upstream JSON: {e}"),
        })?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let usage = body
            .get("usage")
            .and_then(|u| serde_json::from_value(u.clone()).ok())
            .unwrap_or_default();

        Ok(UpstreamCompletion { content, usage })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(upstream_url: String) -> GatewayConfig {
        GatewayConfig {
            valid_api_key: "sk-test".to_string(),
            upstream_url,
            proxy_url: None,
            max_token_failures: 3,
            consecutive_failure_threshold: 2,
            auto_update_enabled: false,
            update_interval: Duration::from_secs(86_400),
            token_file: PathBuf::from("tokens.txt"),
            accounts_file: PathBuf::from("accounts.txt"),
            token_generator_cmd: "cat".to_string(),
            request_timeout: Duration::from_secs(5),
            stream_delay: Duration::from_millis(1),
            stream_chunk_size: 50,
            max_stream_time: Duration::from_secs(10),
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }

    fn dispatcher(server_uri: &str, tokens: &[&str]) -> (RequestDispatcher, Arc<TokenPool>) {
        let config = test_config(format!("{server_uri}/api/chat/completions"));
        let pool = Arc::new(TokenPool::new(3));
        pool.replace(tokens.iter().map(|s| s.to_string()).collect())
            .unwrap();
        let client = upstream::build_client(&config).unwrap();
        (
            RequestDispatcher::new(client, Arc::clone(&pool), None, config),
            pool,
        )
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 7, "total_tokens": 10},
        })
    }

    #[tokio::test]
    async fn test_successful_dispatch_records_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("<answer>ok</answer>")))
            .mount(&server)
            .await;

        let (dispatcher, pool) = dispatcher(&server.uri(), &["good"]);
        pool.record_failure("good", "earlier blip");

        let completion = dispatcher.dispatch(&[ChatMessage::new("user", "hi")], "m").await.unwrap();

        assert_eq!(completion.content, "<answer>ok</answer>");
        assert_eq!(completion.usage.total_tokens, 10);
        assert_eq!(pool.consecutive_failures(), 0);
        assert!(pool.stats().tokens.iter().all(|t| t.failure_count == 0));
    }

    #[tokio::test]
    async fn test_failover_to_next_token_on_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
            .mount(&server)
            .await;

        let (dispatcher, pool) = dispatcher(&server.uri(), &["bad", "good"]);

        let completion = dispatcher.dispatch(&[ChatMessage::new("user", "hi")], "m").await.unwrap();

        assert_eq!(completion.content, "recovered");
        let stats = pool.stats();
        assert_eq!(stats.tokens[0].failure_count, 1);
        assert_eq!(stats.tokens[1].failure_count, 0);
    }

    #[tokio::test]
    async fn test_all_tokens_failing_is_pool_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let (dispatcher, pool) = dispatcher(&server.uri(), &["a", "b", "c"]);

        let err = dispatcher.dispatch(&[ChatMessage::new("user", "hi")], "m").await.unwrap_err();

        assert!(matches!(err, GatewayError::PoolExhausted { .. }));
        // exactly one failure per token, bounded by pool size
        assert!(pool.stats().tokens.iter().all(|t| t.failure_count == 1));
        assert_eq!(pool.consecutive_failures(), 3);
    }

    #[tokio::test]
    async fn test_upstream_5xx_counts_as_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (dispatcher, _pool) = dispatcher(&server.uri(), &["only"]);

        let err = dispatcher.dispatch(&[ChatMessage::new("user", "hi")], "m").await.unwrap_err();
        assert!(matches!(err, GatewayError::PoolExhausted { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_pool_surfaces_immediately() {
        let config = test_config("http://127.0.0.1:1/unused".to_string());
        let pool = Arc::new(TokenPool::new(3));
        let client = upstream::build_client(&config).unwrap();
        let dispatcher = RequestDispatcher::new(client, pool, None, config);

        let err = dispatcher.dispatch(&[ChatMessage::new("user", "hi")], "m").await.unwrap_err();
        assert!(matches!(err, GatewayError::PoolExhausted { .. }));
    }
}
