//! Rotating credential pool.
//!
//! Tokens are selected round-robin, skipping disabled entries. A token
//! that fails `max_failures` times is disabled until an admin reset or
//! a pool replacement. The pool also keeps one pool-wide consecutive
//! failure counter the refresh scheduler watches.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use k2gate_types::models::{mask_token, PoolStats, TokenStat};
use k2gate_types::GatewayError;
use tracing::{debug, info, warn};


#[derive(Debug)]
struct TokenRecord {
    value: String,
    failure_count: u32,
    enabled: bool,
    last_used_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    fn new(value: String) -> Self {
        Self {
            value,
            failure_count: 0,
            enabled: true,
            last_used_at: None,
            last_failure_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    tokens: Vec<TokenRecord>,
    cursor: usize,
    /// Bumped on every successful replacement; lets callers detect a swap.
    generation: u64,
    consecutive_failures: u32,
}

/// Thread-safe token pool shared by the dispatcher, the refresh
/// pipeline, and the admin API.
#[derive(Debug)]
pub struct TokenPool {
    inner: Mutex<PoolInner>,
    max_failures: u32,
}

impl TokenPool {
    /// Creates an empty pool. Selection fails until tokens are loaded.
    pub fn new(max_failures: u32) -> Self {
        Self { inner: Mutex::new(PoolInner::default()), max_failures }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parses a line-delimited token file: one credential per line,
    /// blank lines and `#` comments skipped.
    pub fn parse_token_lines(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Loads the pool from the token file, replacing current contents.
    pub fn load_from_file(&self, path: &Path) -> Result<usize, GatewayError> {
        let content = std::fs::read_to_string(path).map_err(|e| GatewayError::EmptyPool {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        self.replace(Self::parse_token_lines(&content))
    }

    /// Atomically replaces the whole pool. An empty replacement is
    /// rejected so a bad refresh can never wipe a working pool.
    pub fn replace(&self, tokens: Vec<String>) -> Result<usize, GatewayError> {
        if tokens.is_empty() {
            return Err(GatewayError::EmptyPool {
                reason: "replacement set contains no tokens".to_string(),
            });
        }

        let mut inner = self.lock();
        let old = inner.tokens.len();
        inner.tokens = tokens.into_iter().map(TokenRecord::new).collect();
        inner.cursor = 0;
        inner.consecutive_failures = 0;
        inner.generation += 1;
        let new = inner.tokens.len();
        info!("🔄 Token pool replaced: {old} -> {new} tokens (generation {})", inner.generation);
        Ok(new)
    }

    /// Returns the next enabled token, advancing the rotation cursor.
    pub fn select(&self) -> Result<String, GatewayError> {
        let mut inner = self.lock();
        if inner.tokens.is_empty() {
            return Err(GatewayError::PoolExhausted { reason: "token pool is empty".to_string() });
        }

        let len = inner.tokens.len();
        for _ in 0..len {
            let idx = inner.cursor;
            inner.cursor = (inner.cursor + 1) % len;
            if inner.tokens[idx].enabled {
                inner.tokens[idx].last_used_at = Some(Utc::now());
                debug!(
                    "Token selected (index: {idx}, failures: {})",
                    inner.tokens[idx].failure_count
                );
                return Ok(inner.tokens[idx].value.clone());
            }
        }

        warn!("All tokens are disabled");
        Err(GatewayError::PoolExhausted { reason: "all tokens are disabled".to_string() })
    }

    /// Records a failure against the token holding `value` and bumps the
    /// pool-wide consecutive counter. Returns `true` if the token just
    /// crossed the disable threshold. A value no longer in the pool
    /// (replaced mid-flight) is a no-op.
    pub fn record_failure(&self, value: &str, error: &str) -> bool {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        let consecutive = inner.consecutive_failures;
        let max_failures = self.max_failures;

        let Some((idx, record)) =
            inner.tokens.iter_mut().enumerate().find(|(_, t)| t.value == value)
        else {
            debug!("Failure for a token no longer in the pool, ignoring");
            return false;
        };

        record.failure_count += 1;
        record.last_failure_at = Some(Utc::now());
        warn!(
            "Token failure (index: {idx}, failures: {}/{}, consecutive: {consecutive}): {error}",
            record.failure_count, max_failures
        );

        if record.enabled && record.failure_count >= max_failures {
            record.enabled = false;
            warn!("🚫 Token disabled (index: {idx}, failures: {})", record.failure_count);
            return true;
        }
        false
    }

    /// Records a success: clears the token's failure count (re-enabling
    /// it if a concurrent dispatch disabled it mid-flight) and resets
    /// the pool-wide consecutive counter.
    pub fn record_success(&self, value: &str) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if let Some((idx, record)) =
            inner.tokens.iter_mut().enumerate().find(|(_, t)| t.value == value)
        {
            if record.failure_count > 0 || !record.enabled {
                info!("Token recovered (index: {idx}, failures reset: {} -> 0)", record.failure_count);
                record.failure_count = 0;
                record.enabled = true;
            }
        }
    }

    /// Re-enables one token and clears its failure count.
    pub fn reset(&self, index: usize) -> bool {
        let mut inner = self.lock();
        let Some(record) = inner.tokens.get_mut(index) else {
            warn!("Invalid token index: {index}");
            return false;
        };
        record.failure_count = 0;
        record.enabled = true;
        record.last_failure_at = None;
        info!("Token reset (index: {index})");
        true
    }

    /// Re-enables every token and clears all failure counts.
    pub fn reset_all(&self) -> usize {
        let mut inner = self.lock();
        let mut reset = 0;
        for record in &mut inner.tokens {
            if record.failure_count > 0 || !record.enabled {
                record.failure_count = 0;
                record.enabled = true;
                record.last_failure_at = None;
                reset += 1;
            }
        }
        info!("Reset {reset} tokens");
        reset
    }

    pub fn reset_consecutive_failures(&self) {
        let mut inner = self.lock();
        if inner.consecutive_failures > 0 {
            info!("Consecutive failure counter reset: {} -> 0", inner.consecutive_failures);
            inner.consecutive_failures = 0;
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tokens.is_empty()
    }

    pub fn enabled_len(&self) -> usize {
        self.lock().tokens.iter().filter(|t| t.enabled).count()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Snapshot for the admin API. Token values are masked.
    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        let enabled = inner.tokens.iter().filter(|t| t.enabled).count();
        PoolStats {
            total_tokens: inner.tokens.len(),
            enabled_tokens: enabled,
            disabled_tokens: inner.tokens.len() - enabled,
            max_failures: self.max_failures,
            consecutive_failures: inner.consecutive_failures,
            generation: inner.generation,
            tokens: inner
                .tokens
                .iter()
                .enumerate()
                .map(|(index, t)| TokenStat {
                    index,
                    token_prefix: mask_token(&t.value),
                    failure_count: t.failure_count,
                    enabled: t.enabled,
                    last_used_at: t.last_used_at,
                    last_failure_at: t.last_failure_at,
                })
                .collect(),
        }
    }
}
