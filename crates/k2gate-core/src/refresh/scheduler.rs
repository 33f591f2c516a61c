//! Refresh trigger coalescing and the periodic timer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{RefreshReason, TokenUpdater};
use crate::config::GatewayConfig;
use crate::token_pool::TokenPool;

/// Triggers beyond this queue depth are dropped; a queued refresh
/// already covers them.
const QUEUE_DEPTH: usize = 4;

/// Single-consumer refresh queue.
///
/// All triggers funnel into one bounded channel drained by one worker
/// task, so refreshes never overlap and never block request dispatch.
/// When the channel is full the trigger is dropped: the refresh already
/// queued will re-satisfy it.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    tx: mpsc::Sender<RefreshReason>,
    pool: Arc<TokenPool>,
    threshold: u32,
    auto_update: bool,
}

impl RefreshScheduler {
    /// Spawns the worker task and, when auto-update is enabled, the
    /// interval timer task.
    pub fn spawn(updater: Arc<TokenUpdater>, pool: Arc<TokenPool>, config: &GatewayConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<RefreshReason>(QUEUE_DEPTH);

        let scheduler = Self {
            tx: tx.clone(),
            pool: Arc::clone(&pool),
            threshold: config.consecutive_failure_threshold,
            auto_update: config.auto_update_enabled,
        };

        {
            let pool = Arc::clone(&pool);
            let threshold = config.consecutive_failure_threshold;
            tokio::spawn(async move {
                while let Some(reason) = rx.recv().await {
                    // A refresh that ran while this trigger sat in the
                    // queue may already have cleared the condition.
                    if reason == RefreshReason::ConsecutiveFailures
                        && pool.consecutive_failures() < threshold
                    {
                        debug!("Stale consecutive-failure trigger, skipping");
                        continue;
                    }
                    updater.run_update(reason).await;
                }
            });
        }

        if config.auto_update_enabled {
            let tx = tx.clone();
            let period = config.update_interval;
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(period);
                timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // the first tick completes immediately
                timer.tick().await;
                loop {
                    timer.tick().await;
                    if tx.send(RefreshReason::Interval).await.is_err() {
                        break;
                    }
                }
            });
            info!("⏰ Token auto-update scheduled every {}s", period.as_secs());
        }

        scheduler
    }

    /// Queues a refresh. Returns `false` when the trigger coalesced
    /// into an already-queued one.
    pub fn request(&self, reason: RefreshReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => {
                info!("Refresh queued (reason: {})", reason.as_str());
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Refresh queue full, trigger coalesced ({})", reason.as_str());
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Refresh worker is gone, trigger dropped");
                false
            }
        }
    }

    /// Called after every recorded failure: fires a refresh when the
    /// consecutive threshold is crossed, the pool is large enough that
    /// the failures look systemic, and auto-update is on.
    pub fn observe_failure(&self) {
        if !self.auto_update {
            return;
        }
        if self.pool.len() <= 2 {
            debug!("Pool too small ({}), skipping consecutive-failure check", self.pool.len());
            return;
        }
        if self.pool.consecutive_failures() >= self.threshold {
            warn!(
                "🚨 {} consecutive failures across the pool, requesting refresh",
                self.pool.consecutive_failures()
            );
            self.request(RefreshReason::ConsecutiveFailures);
        }
    }
}
