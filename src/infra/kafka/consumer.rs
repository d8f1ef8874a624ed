use {
    crate::domain::error::PipelineError,
    crate::services::consumers::{EventHandler, dispatch},
    rdkafka::config::ClientConfig,
    rdkafka::consumer::{Consumer, StreamConsumer},
    rdkafka::message::Message,
    std::sync::Arc,
    tokio::sync::watch,
};

/// One consumer group reading a whole topic and applying each event
/// through an idempotent handler.
pub struct KafkaEventConsumer {
    consumer: StreamConsumer,
    group_id: String,
}

impl KafkaEventConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .create()?;

        consumer.subscribe(&[topic])?;

        Ok(Self {
            consumer,
            group_id: group_id.to_string(),
        })
    }

    pub async fn run(&self, handler: Arc<dyn EventHandler>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(group = %self.group_id, handler = handler.name(), "consumer started");

        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.consumer.recv() => received,
            };

            let (key, payload) = match received {
                Ok(message) => (
                    message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                    message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                ),
                Err(e) => {
                    tracing::error!(group = %self.group_id, error = %e, "failed to read message");
                    continue;
                }
            };

            dispatch(handler.as_ref(), key.as_deref(), &payload).await;
        }

        tracing::info!(group = %self.group_id, "consumer stopped");
    }
}
