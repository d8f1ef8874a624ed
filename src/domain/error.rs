use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("idempotency key already used")]
    DuplicatePayment,

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis: {0}")]
    Redis(#[from] fred::error::Error),

    #[error("broker: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported event type: {0}")]
    UnsupportedEvent(String),

    #[error("infrastructure: {0}")]
    Infrastructure(String),
}

impl PipelineError {
    /// Store or broker failures. The command aborts and the caller may retry.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::Broker(_) | Self::Infrastructure(_)
        )
    }
}
