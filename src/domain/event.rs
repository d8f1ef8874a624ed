use {
    super::error::PipelineError,
    super::id::{OrderReference, UserId},
    super::money::Amount,
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

pub const TOPIC_PAYMENTS: &str = "payments";
pub const EVENT_PAYMENT_SUCCESSFUL: &str = "payment.successful";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccessful {
    pub order_reference: OrderReference,
    pub user_id: UserId,
    pub amount: Amount,
}

/// Events this service emits, tagged by `event_type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    PaymentSuccessful(PaymentSuccessful),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PaymentSuccessful(_) => EVENT_PAYMENT_SUCCESSFUL,
        }
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, PipelineError> {
        let value = match self {
            Self::PaymentSuccessful(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Rebuild a typed event from its tag and raw payload.
    pub fn decode(event_type: &str, payload: serde_json::Value) -> Result<Self, PipelineError> {
        match event_type {
            EVENT_PAYMENT_SUCCESSFUL => Ok(Self::PaymentSuccessful(serde_json::from_value(payload)?)),
            other => Err(PipelineError::UnsupportedEvent(other.to_string())),
        }
    }
}

/// Pending or published row of the outbox table. The payload stays untyped
/// so storage and broker code never depend on concrete event types.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Fresh pending row for `event`, keyed by a new time-ordered id.
    pub fn record(event: &DomainEvent) -> Result<Self, PipelineError> {
        Ok(Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            timestamp: Utc::now(),
            payload: event.to_payload()?,
            published_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.published_at.is_none()
    }
}

/// Wire form of an event on the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: String,
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(event_type: &str, event_id: Uuid, timestamp: DateTime<Utc>, payload: P) -> Self {
        Self {
            event_id,
            event_type: event_type.to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            payload,
        }
    }
}

impl<P: Serialize> Envelope<P> {
    pub fn encode(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec(self)?)
    }
}
