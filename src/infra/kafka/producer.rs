use {
    crate::domain::error::PipelineError,
    crate::domain::event::Envelope,
    crate::domain::ports::{BoxFuture, EventProducer},
    chrono::{DateTime, Utc},
    rdkafka::config::ClientConfig,
    rdkafka::message::{Header, OwnedHeaders},
    rdkafka::producer::{FutureProducer, FutureRecord},
    std::time::Duration,
    uuid::Uuid,
};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaEventProducer {
    producer: FutureProducer,
}

impl KafkaEventProducer {
    pub fn new(brokers: &str) -> Result<Self, PipelineError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()?;

        Ok(Self { producer })
    }
}

impl EventProducer for KafkaEventProducer {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        event_type: &'a str,
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let body = Envelope::new(event_type, event_id, timestamp, payload).encode()?;
            let key = event_id.to_string();

            let record = FutureRecord::to(topic)
                .key(&key)
                .payload(&body)
                .headers(OwnedHeaders::new().insert(Header {
                    key: "event_type",
                    value: Some(event_type),
                }));

            self.producer
                .send(record, DELIVERY_TIMEOUT)
                .await
                .map_err(|(e, _)| PipelineError::Broker(e))?;

            Ok(())
        })
    }
}
