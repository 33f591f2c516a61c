//! External credential-generation process.

use std::path::PathBuf;
use std::process::Stdio;

use k2gate_types::GatewayError;
use tokio::process::Command;
use tracing::{info, warn};

use crate::token_pool::TokenPool;

/// Wraps the external command that logs into the upstream accounts and
/// prints one fresh credential per line on stdout.
#[derive(Debug, Clone)]
pub struct CredentialGenerator {
    command: String,
    accounts_file: PathBuf,
    proxy_url: Option<String>,
}

impl CredentialGenerator {
    pub fn new(command: String, accounts_file: PathBuf, proxy_url: Option<String>) -> Self {
        Self { command, accounts_file, proxy_url }
    }

    /// Runs the generator and returns the candidate token list.
    ///
    /// The command string may carry its own arguments; the account file
    /// path is appended last and `PROXY_URL` is passed via the
    /// environment when configured.
    pub async fn generate(&self) -> Result<Vec<String>, GatewayError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or_else(|| GatewayError::RefreshValidation {
            message: "TOKEN_GENERATOR_CMD is empty".to_string(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .arg(&self.accounts_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(proxy) = &self.proxy_url {
            cmd.env("PROXY_URL", proxy);
        }

        info!("🔑 Running credential generator: {}", self.command);
        let output = cmd.output().await.map_err(|e| GatewayError::RefreshValidation {
            message: format!("failed to spawn generator '{}': {e}", self.command),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Generator exited with {}: {}", output.status, stderr.trim());
            return Err(GatewayError::RefreshValidation {
                message: format!("generator exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tokens = TokenPool::parse_token_lines(&stdout);
        info!("Generator produced {} candidate tokens", tokens.len());
        Ok(tokens)
    }
}
