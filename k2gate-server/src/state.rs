//! Shared application state.

use std::sync::Arc;

use k2gate_core::refresh::{CredentialGenerator, RefreshScheduler, TokenUpdater};
use k2gate_core::{GatewayConfig, RequestDispatcher, TokenPool};

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub pool: Arc<TokenPool>,
    pub updater: Arc<TokenUpdater>,
    pub scheduler: RefreshScheduler,
    pub dispatcher: RequestDispatcher,
}

impl AppState {
    /// Wires the pool, refresh pipeline, and dispatcher together and
    /// spawns the scheduler's background tasks.
    pub fn build(config: GatewayConfig) -> Result<Self, k2gate_types::GatewayError> {
        let pool = Arc::new(TokenPool::new(config.max_token_failures));

        let generator = CredentialGenerator::new(
            config.token_generator_cmd.clone(),
            config.accounts_file.clone(),
            config.proxy_url.clone(),
        );
        let updater = Arc::new(TokenUpdater::new(
            Arc::clone(&pool),
            generator,
            config.clone(),
        ));
        let scheduler = RefreshScheduler::spawn(Arc::clone(&updater), Arc::clone(&pool), &config);

        let client = k2gate_core::upstream::build_client(&config)?;
        let dispatcher = RequestDispatcher::new(
            client,
            Arc::clone(&pool),
            Some(scheduler.clone()),
            config.clone(),
        );

        Ok(Self { config, pool, updater, scheduler, dispatcher })
    }
}
