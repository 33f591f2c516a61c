//! K2 Gateway core.
//!
//! Everything between the HTTP surface and the upstream K2-Think API:
//! the rotating token pool, the credential refresh pipeline, request
//! dispatch with failover, and translation of the upstream tagged
//! output into OpenAI-shaped responses.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod refresh;
pub mod token_pool;
pub mod tools;
pub mod translate;
pub mod upstream;

pub use config::GatewayConfig;
pub use dispatch::RequestDispatcher;
pub use refresh::{RefreshReason, RefreshScheduler, TokenUpdater};
pub use token_pool::TokenPool;
