pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    domain::ports::UnitOfWork,
    services::payment_processor::PaymentProcessor,
    std::sync::Arc,
};

pub struct AppState<U: UnitOfWork> {
    pub processor: Arc<PaymentProcessor<U>>,
}

impl<U: UnitOfWork> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
        }
    }
}
