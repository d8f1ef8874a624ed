use {
    super::event::{DomainEvent, PaymentSuccessful},
    super::id::{IdempotencyKey, OrderReference, UserId},
    super::money::Amount,
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::fmt,
    uuid::Uuid,
};

/// A request to pay for an order, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCommand {
    pub user_id: UserId,
    pub order_reference: OrderReference,
    pub amount: Amount,
    pub idempotency_key: IdempotencyKey,
}

/// Ledger fact. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    order_reference: OrderReference,
    user_id: UserId,
    amount: Amount,
    created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        order_reference: OrderReference,
        user_id: UserId,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_reference,
            user_id,
            amount,
            created_at,
        }
    }

    pub fn from_command(cmd: &PaymentCommand) -> Self {
        Self::new(cmd.order_reference, cmd.user_id, cmd.amount, Utc::now())
    }

    pub fn order_reference(&self) -> OrderReference {
        self.order_reference
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The event announcing this payment to downstream services.
    pub fn succeeded_event(&self) -> DomainEvent {
        DomainEvent::PaymentSuccessful(PaymentSuccessful {
            order_reference: self.order_reference,
            user_id: self.user_id,
            amount: self.amount,
        })
    }
}

/// Returned once the ledger and outbox rows are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAccepted {
    pub event_id: Uuid,
}

/// Progress of a single command through the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStage {
    Start,
    GuardChecked,
    Committed,
    Done,
    /// Duplicate key: nothing written.
    Rejected,
    /// Aborted before commit: nothing written, key released.
    Failed,
}

impl CommandStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::GuardChecked => "guard_checked",
            Self::Committed => "committed",
            Self::Done => "done",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for CommandStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
