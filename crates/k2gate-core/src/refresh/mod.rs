//! Credential refresh pipeline.
//!
//! [`CredentialGenerator`] shells out to the external generator,
//! [`TokenUpdater`] validates the candidate list and swaps the token
//! file atomically, and [`RefreshScheduler`] decides when a refresh
//! runs (interval timer, consecutive-failure threshold, startup, or a
//! forced admin request) while coalescing overlapping triggers.

mod generator;
mod scheduler;
mod updater;

pub use generator::CredentialGenerator;
pub use scheduler::RefreshScheduler;
pub use updater::{RefreshOutcome, TokenUpdater};


/// Why a refresh was requested. Carried through the scheduler queue so
/// the updater can log the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The periodic timer elapsed.
    Interval,
    /// The pool-wide consecutive failure threshold was crossed.
    ConsecutiveFailures,
    /// The token source was missing or empty at startup.
    StartupEmpty,
    /// An explicit force-update request from the admin API.
    Forced,
}

impl RefreshReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::ConsecutiveFailures => "consecutive_failures",
            Self::StartupEmpty => "startup_empty",
            Self::Forced => "forced",
        }
    }
}
