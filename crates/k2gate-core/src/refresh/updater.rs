//! Validated, atomic token-file replacement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use k2gate_types::models::{RefreshResult, UpdaterStatus};
use k2gate_types::GatewayError;
use tracing::{error, info, warn};

use super::{CredentialGenerator, RefreshReason};
use crate::config::GatewayConfig;
use crate::token_pool::TokenPool;

/// What a refresh attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The pool was replaced with this many tokens.
    Updated(usize),
    /// Another refresh was already in flight; this one coalesced away.
    AlreadyRunning,
    /// The refresh ran and failed; the old pool is untouched.
    Failed(GatewayError),
}

#[derive(Debug, Default)]
struct UpdaterState {
    update_count: u64,
    error_count: u64,
    last_update: Option<DateTime<Utc>>,
    last_result: Option<RefreshResult>,
    last_error: Option<String>,
}

/// Runs the full refresh sequence: generate, validate, swap, reload.
///
/// The swap writes the candidate list to `<token_file>.tmp`, renames
/// the active file to `<token_file>.bak`, then renames the tmp file
/// into place. Each rename is atomic at the filesystem level, so a
/// crash mid-sequence leaves either the old or the new file intact.
#[derive(Debug)]
pub struct TokenUpdater {
    pool: Arc<TokenPool>,
    generator: CredentialGenerator,
    config: GatewayConfig,
    is_updating: AtomicBool,
    state: Mutex<UpdaterState>,
}

impl TokenUpdater {
    pub fn new(pool: Arc<TokenPool>, generator: CredentialGenerator, config: GatewayConfig) -> Self {
        Self {
            pool,
            generator,
            config,
            is_updating: AtomicBool::new(false),
            state: Mutex::new(UpdaterState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, UpdaterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes a tmp file orphaned by a crash mid-swap. Called once at
    /// startup before any refresh runs.
    pub async fn cleanup_stale_tmp(&self) {
        let tmp = self.config.token_tmp_file();
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => warn!("🔧 Removed stale temp file {}", tmp.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove stale temp file {}: {e}", tmp.display()),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::SeqCst)
    }

    /// Runs one refresh. At most one runs at a time; a concurrent call
    /// returns [`RefreshOutcome::AlreadyRunning`] immediately.
    pub async fn run_update(&self, reason: RefreshReason) -> RefreshOutcome {
        if self
            .is_updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Refresh already in progress, skipping ({})", reason.as_str());
            self.state().last_result = Some(RefreshResult::Skipped);
            return RefreshOutcome::AlreadyRunning;
        }

        info!("🔄 Token refresh started (reason: {})", reason.as_str());
        let outcome = self.refresh_inner().await;

        {
            let mut state = self.state();
            match &outcome {
                Ok(count) => {
                    state.update_count += 1;
                    state.last_update = Some(Utc::now());
                    state.last_result = Some(RefreshResult::Success);
                    state.last_error = None;
                    info!("✅ Token refresh complete: {count} tokens active");
                }
                Err(e) => {
                    state.error_count += 1;
                    state.last_result = Some(RefreshResult::Failed);
                    state.last_error = Some(e.to_string());
                    error!("❌ Token refresh failed: {e}");
                }
            }
        }

        self.is_updating.store(false, Ordering::SeqCst);
        match outcome {
            Ok(count) => RefreshOutcome::Updated(count),
            Err(e) => RefreshOutcome::Failed(e),
        }
    }

    async fn refresh_inner(&self) -> Result<usize, GatewayError> {
        let candidate = self.generator.generate().await?;
        if candidate.is_empty() {
            return Err(GatewayError::RefreshValidation {
                message: "generator produced no usable tokens".to_string(),
            });
        }

        self.swap_token_file(&candidate).await?;

        // Reload from the new active file; this also resets the
        // consecutive failure counter.
        let active = self.config.token_file.clone();
        let content = tokio::fs::read_to_string(&active).await.map_err(|e| {
            GatewayError::RefreshSwap {
                message: format!("cannot re-read {}: {e}", active.display()),
            }
        })?;
        self.pool.replace(TokenPool::parse_token_lines(&content))
    }

    /// tmp -> bak -> active rename sequence.
    async fn swap_token_file(&self, tokens: &[String]) -> Result<(), GatewayError> {
        let active = self.config.token_file.clone();
        let tmp = self.config.token_tmp_file();
        let bak = self.config.token_bak_file();

        let mut body = tokens.join("\n");
        body.push('\n');
        tokio::fs::write(&tmp, body).await.map_err(|e| GatewayError::RefreshSwap {
            message: format!("cannot write {}: {e}", tmp.display()),
        })?;

        // No active file on first run; skip the backup step.
        match tokio::fs::rename(&active, &bak).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(GatewayError::RefreshSwap {
                    message: format!(
                        "cannot back up {} to {}: {e}",
                        active.display(),
                        bak.display()
                    ),
                })
            }
        }

        tokio::fs::rename(&tmp, &active).await.map_err(|e| GatewayError::RefreshSwap {
            message: format!("cannot activate {}: {e}", active.display()),
        })?;
        Ok(())
    }

    /// Snapshot for `/admin/tokens/updater/status`.
    pub fn status(&self) -> UpdaterStatus {
        let state = self.state();
        UpdaterStatus {
            auto_update_enabled: self.config.auto_update_enabled,
            is_updating: self.is_updating(),
            interval_secs: self.config.update_interval.as_secs(),
            update_count: state.update_count,
            last_update: state.last_update,
            last_result: state.last_result.clone(),
            last_error: state.last_error.clone(),
        }
    }
}
