use {
    crate::domain::error::PipelineError,
    crate::domain::event::{DomainEvent, Envelope, PaymentSuccessful},
    crate::domain::id::{IdempotencyKey, OrderReference, UserId},
    crate::domain::ports::{BoxFuture, IdempotencyStore},
    std::sync::Arc,
    uuid::Uuid,
};

pub const ORDER_SERVICE_GROUP: &str = "order-service";
pub const NOTIFICATION_SERVICE_GROUP: &str = "notification-service";

/// Applies one decoded event. Must tolerate redelivery of the same
/// `event_id`: applying twice leaves the same state as applying once.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle<'a>(
        &'a self,
        event_id: Uuid,
        event: &'a DomainEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    Malformed,
    Unsupported,
    Failed,
}

/// Decode a raw broker message and hand it to `handler`.
/// Never fails: bad messages are logged and skipped so the consumer loop
/// moves on to the next one.
pub async fn dispatch(handler: &dyn EventHandler, key: Option<&str>, bytes: &[u8]) -> Dispatch {
    let envelope: Envelope<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(handler = handler.name(), message_key = ?key, error = %e, "failed to decode envelope");
            return Dispatch::Malformed;
        }
    };

    let event_id = envelope.event_id;
    let event = match DomainEvent::decode(&envelope.event_type, envelope.payload) {
        Ok(event) => event,
        Err(PipelineError::UnsupportedEvent(event_type)) => {
            tracing::warn!(handler = handler.name(), event_id = %event_id, event_type = %event_type, "skipping unsupported event type");
            return Dispatch::Unsupported;
        }
        Err(e) => {
            tracing::error!(handler = handler.name(), event_id = %event_id, error = %e, "failed to decode payload");
            return Dispatch::Malformed;
        }
    };

    match handler.handle(event_id, &event).await {
        Ok(()) => Dispatch::Applied,
        Err(e) => {
            tracing::error!(handler = handler.name(), event_id = %event_id, error = %e, "handler failed");
            Dispatch::Failed
        }
    }
}

// ── Order status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Paid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            other => Err(PipelineError::Validation(format!("unknown order status: {other}"))),
        }
    }
}

pub trait OrderStatusRepository: Send + Sync {
    /// `Ok(true)` if the order moved to paid, `Ok(false)` if it already was.
    fn mark_paid(&self, order: OrderReference) -> BoxFuture<'_, Result<bool, PipelineError>>;
}

/// Order service side: a successful payment marks its order paid.
pub struct OrderPaymentHandler {
    orders: Arc<dyn OrderStatusRepository>,
}

impl OrderPaymentHandler {
    pub fn new(orders: Arc<dyn OrderStatusRepository>) -> Self {
        Self { orders }
    }
}

impl EventHandler for OrderPaymentHandler {
    fn name(&self) -> &'static str {
        "order_payment"
    }

    fn handle<'a>(
        &'a self,
        event_id: Uuid,
        event: &'a DomainEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let DomainEvent::PaymentSuccessful(payment) = event;
            if self.orders.mark_paid(payment.order_reference).await? {
                tracing::info!(event_id = %event_id, order_reference = %payment.order_reference, "order marked as paid");
            } else {
                tracing::info!(event_id = %event_id, order_reference = %payment.order_reference, "order already paid, redelivery ignored");
            }
            Ok(())
        })
    }
}

// ── Notifications ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn payment_succeeded(payment: &PaymentSuccessful) -> Self {
        Self {
            user_id: payment.user_id,
            subject: "Payment received".to_string(),
            message: format!(
                "Thank you for paying order {} ({}).",
                payment.order_reference, payment.amount
            ),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Writes notifications to the log instead of a mail gateway.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            tracing::info!(
                user_id = %notification.user_id,
                subject = %notification.subject,
                message = %notification.message,
                "notification sent"
            );
            Ok(())
        })
    }
}

/// Notification service side: one message per payment event id.
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
    sent: Arc<dyn IdempotencyStore>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>, sent: Arc<dyn IdempotencyStore>) -> Self {
        Self { notifier, sent }
    }
}

impl EventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "payment_notification"
    }

    fn handle<'a>(
        &'a self,
        event_id: Uuid,
        event: &'a DomainEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let DomainEvent::PaymentSuccessful(payment) = event;
            let key = IdempotencyKey::new(format!("notification:{event_id}"))?;
            let token = Uuid::now_v7();

            if !self.sent.try_reserve(&key, token).await? {
                tracing::info!(event_id = %event_id, "notification already sent, redelivery ignored");
                return Ok(());
            }

            let notification = Notification::payment_succeeded(payment);
            if let Err(e) = self.notifier.send(&notification).await {
                // Let a redelivery try again.
                self.sent.release(&key, token).await?;
                return Err(e);
            }

            Ok(())
        })
    }
}
