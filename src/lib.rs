pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use db::{PaymentStore, PgPaymentStore};
use services::PaymentProcessor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    pub store: Arc<dyn PaymentStore>,
    pub processor: Arc<PaymentProcessor>,
}

impl AppState {
    pub fn new(config: Config, db: PgPool, processor: PaymentProcessor) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(PgPaymentStore::new(db.clone())),
            db,
            processor: Arc::new(processor),
        }
    }
}
