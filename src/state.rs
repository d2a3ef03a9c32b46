use std::sync::Arc;

use crate::config::Config;
use crate::payments::PaymentGateway;
use crate::store::MarketplaceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketplaceStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        payments: Arc<dyn PaymentGateway>,
        config: Config,
    ) -> Self {
        tracing::info!(
            store = store.backend_tag(),
            payments = payments.provider(),
            "Application state initialized"
        );
        Self {
            store,
            payments,
            config: Arc::new(config),
        }
    }
}
