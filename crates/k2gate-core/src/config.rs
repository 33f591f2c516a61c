//! Environment-driven gateway configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use k2gate_types::GatewayError;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// All runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Shared API key clients must present as a bearer token.
    pub valid_api_key: String,
    /// Upstream chat-completion endpoint.
    pub upstream_url: String,
    /// Optional SOCKS/HTTP proxy for upstream and generator traffic.
    pub proxy_url: Option<String>,

    /// Failures before a token is disabled.
    pub max_token_failures: u32,
    /// Pool-wide consecutive failures that trigger a refresh.
    pub consecutive_failure_threshold: u32,

    pub auto_update_enabled: bool,
    pub update_interval: Duration,
    /// Line-delimited credential file the pool loads from.
    pub token_file: PathBuf,
    /// Line-delimited JSON account file the generator consumes.
    pub accounts_file: PathBuf,
    /// External command that regenerates the token file.
    pub token_generator_cmd: String,

    pub request_timeout: Duration,
    /// Delay between re-chunked streaming deltas.
    pub stream_delay: Duration,
    /// Base chunk size before the dynamic adjustment.
    pub stream_chunk_size: usize,
    /// Upper bound on total simulated streaming time.
    pub max_stream_time: Duration,

    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    /// Reads configuration from the environment, applying the defaults
    /// documented in the README.
    pub fn from_env() -> Self {
        Self {
            valid_api_key: std::env::var("VALID_API_KEY").unwrap_or_default(),
            upstream_url: std::env::var("K2THINK_API_URL")
                .unwrap_or_else(|_| "https://www.k2think.ai/api/chat/completions".to_string()),
            proxy_url: std::env::var("PROXY_URL").ok().filter(|s| !s.is_empty()),
            max_token_failures: env_or("MAX_TOKEN_FAILURES", 3),
            consecutive_failure_threshold: env_or("CONSECUTIVE_FAILURE_THRESHOLD", 2),
            auto_update_enabled: env_bool("ENABLE_TOKEN_AUTO_UPDATE", true),
            update_interval: Duration::from_secs(env_or("TOKEN_UPDATE_INTERVAL", 86_400)),
            token_file: PathBuf::from(
                std::env::var("TOKEN_FILE").unwrap_or_else(|_| "tokens.txt".to_string()),
            ),
            accounts_file: PathBuf::from(
                std::env::var("ACCOUNTS_FILE").unwrap_or_else(|_| "accounts.txt".to_string()),
            ),
            token_generator_cmd: std::env::var("TOKEN_GENERATOR_CMD")
                .unwrap_or_else(|_| "k2-credgen".to_string()),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 60)),
            stream_delay: Duration::from_secs_f64(env_or("STREAM_DELAY", 0.05)),
            stream_chunk_size: env_or("STREAM_CHUNK_SIZE", 50),
            max_stream_time: Duration::from_secs_f64(env_or("MAX_STREAM_TIME", 10.0)),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8001),
        }
    }

    /// Validates required settings. Called once at startup; a failure
    /// here is fatal.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.valid_api_key.is_empty() {
            return Err(GatewayError::Internal {
                message: "VALID_API_KEY is not set".to_string(),
            });
        }
        if self.auto_update_enabled && !Path::new(&self.accounts_file).exists() {
            return Err(GatewayError::Internal {
                message: format!(
                    "accounts file {} does not exist",
                    self.accounts_file.display()
                ),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(GatewayError::Internal {
                message: "REQUEST_TIMEOUT must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Sibling of the active token file used during refresh.
    pub fn token_tmp_file(&self) -> PathBuf {
        self.token_sibling(".tmp")
    }

    /// Backup of the previous token file, kept after a successful swap.
    pub fn token_bak_file(&self) -> PathBuf {
        self.token_sibling(".bak")
    }

    /// Appends `suffix` to the full token file name, so any configured
    /// name (not just `*.txt`) keeps its extension in the sibling.
    fn token_sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.token_file.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            valid_api_key: "sk-test".to_string(),
            upstream_url: "https://www.k2think.ai/api/chat/completions".to_string(),
            proxy_url: None,
            max_token_failures: 3,
            consecutive_failure_threshold: 2,
            auto_update_enabled: false,
            update_interval: Duration::from_secs(86_400),
            token_file: PathBuf::from("tokens.txt"),
            accounts_file: PathBuf::from("accounts.txt"),
            token_generator_cmd: "k2-credgen".to_string(),
            request_timeout: Duration::from_secs(60),
            stream_delay: Duration::from_millis(50),
            stream_chunk_size: 50,
            max_stream_time: Duration::from_secs(10),
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }

    #[test]
    fn test_validate_requires_api_key() {
        let mut cfg = test_config();
        cfg.valid_api_key.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_swap_siblings_share_directory() {
        let cfg = test_config();
        assert_eq!(cfg.token_tmp_file(), PathBuf::from("tokens.txt.tmp"));
        assert_eq!(cfg.token_bak_file(), PathBuf::from("tokens.txt.bak"));
    }

    #[test]
    fn test_swap_siblings_keep_non_txt_file_names() {
        let mut cfg = test_config();
        cfg.token_file = PathBuf::from("/etc/k2gate/creds.list");
        assert_eq!(cfg.token_tmp_file(), PathBuf::from("/etc/k2gate/creds.list.tmp"));
        assert_eq!(cfg.token_bak_file(), PathBuf::from("/etc/k2gate/creds.list.bak"));
    }
}
