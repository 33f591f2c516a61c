//! Pool and updater status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-token snapshot exposed by `/admin/tokens/stats`.
///
/// The token value itself never leaves the pool; only a masked prefix
/// is reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStat {
    pub index: usize,
    pub token_prefix: String,
    pub failure_count: u32,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Aggregate pool snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_tokens: usize,
    pub enabled_tokens: usize,
    pub disabled_tokens: usize,
    pub max_failures: u32,
    pub consecutive_failures: u32,
    pub generation: u64,
    pub tokens: Vec<TokenStat>,
}

/// Outcome of the most recent refresh attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshResult {
    Success,
    Failed,
    Skipped,
}

/// Updater status exposed by `/admin/tokens/updater/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterStatus {
    pub auto_update_enabled: bool,
    pub is_updating: bool,
    pub interval_secs: u64,
    pub update_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<RefreshResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Masks a token for logs and stats: first 10 characters plus ellipsis.
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}
